use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

// Failures are classified at the boundary closest to their origin (the
// extraction invoker or the clip post-processor); this boundary only maps
// the classification to a status code.
#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("rate limited by source: {0}")]
  RateLimited(String),

  #[error("access denied by source: {0}")]
  AccessDenied(String),

  #[error("source unavailable: {0}")]
  Unavailable(String),

  #[error("file not found: {0}")]
  FileNotFound(String),

  #[error("extraction failed: {0}")]
  Extraction(String),

  #[error("transcode failed: {0}")]
  ToolFailure(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

impl Error {
  // only transient source-side failures are worth another attempt
  pub fn retryable(&self) -> bool {
    matches!(self, Error::RateLimited(_) | Error::AccessDenied(_))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
      Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
      Error::AccessDenied(_) => StatusCode::FORBIDDEN,
      Error::Unavailable(_) | Error::FileNotFound(_) => StatusCode::NOT_FOUND,
      Error::Extraction(_)
      | Error::ToolFailure(_)
      | Error::Io(_)
      | Error::Json(_)
      | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      // unexpected internals are logged in full, callers get a generic line
      Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
        error!("internal error: {self:?}");
        "internal server error".to_string()
      }
      _ => self.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
