use axum::body::StreamBody;
use axum::extract::Path;
use axum::http::header;
use axum::response::IntoResponse;
use tokio_util::io::ReaderStream;

use crate::{config, Error, Result};

// Serve a previously produced file by name. The name is resolved strictly
// within the output directory before the filesystem is consulted.
#[axum::debug_handler]
pub async fn download_file(
  Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
  let path = config::download_dir().resolve(&filename)?;

  let file = match tokio::fs::File::open(&path).await {
    Ok(file) => file,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(Error::FileNotFound(filename));
    }
    Err(e) => return Err(e.into()),
  };

  let body = StreamBody::new(ReaderStream::new(file));
  let headers = [
    (header::CONTENT_TYPE, content_type(&filename).to_string()),
    (
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{filename}\""),
    ),
  ];
  Ok((headers, body))
}

fn content_type(filename: &str) -> &'static str {
  match filename.rsplit('.').next() {
    Some("mp4") => "video/mp4",
    Some("webm") => "video/webm",
    Some("mkv") => "video/x-matroska",
    _ => "application/octet-stream",
  }
}
