use std::net::SocketAddr;

use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

mod clip;
mod config;
mod cookies;
mod delivery;
mod download;
mod error;
mod extractor;
mod format;
mod retry;
mod store;
mod util;

pub use error::{Error, Result};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
          tracing_subscriber::EnvFilter::new("warn,clipfetch=info")
        }),
    )
    .init();

  config::download_dir().ensure()?;
  match cookies::cookie_file() {
    Some(path) => info!("session cookies provisioned at {}", path.display()),
    None => info!("no session cookies, extracting unauthenticated"),
  }

  let app = Router::new()
    .route("/", get(index))
    .route("/health", get(health))
    .route("/api/download", post(download::download))
    .route("/api/clip", post(download::clip))
    .route("/api/download-file/:filename", get(delivery::download_file));

  let addr = SocketAddr::from(([0, 0, 0, 0], *config::PORT));
  info!("listening on {addr}");

  axum::Server::bind(&addr)
    .serve(app.into_make_service())
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}

async fn shutdown_signal() {
  tokio::signal::ctrl_c()
    .await
    .expect("failed to install ctrl-c handler");
  info!("shutting down");
}

async fn index() -> impl IntoResponse {
  Json(json!({
    "service": env!("CARGO_PKG_NAME"),
    "version": env!("CARGO_PKG_VERSION"),
    "endpoints": [
      "POST /api/download",
      "POST /api/clip",
      "GET /api/download-file/:filename",
      "GET /health",
    ],
  }))
}

async fn health() -> impl IntoResponse {
  "ok"
}
