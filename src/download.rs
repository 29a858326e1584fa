use std::path::Path;

use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::clip::{ClipRange, Clipper, TempSource};
use crate::extractor::{DownloadResult, Extractor, FetchSpec, Ytdlp};
use crate::format::{self, Container};
use crate::retry::RetryPolicy;
use crate::util::strip_query;
use crate::{config, cookies, store, Error, Result};

// immutable once accepted
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
  pub video_url: String,
  #[serde(default)]
  pub format: Container,
  #[serde(default)]
  pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClipRequest {
  pub video_url: String,
  pub start_time: String,
  pub end_time: String,
  #[serde(default)]
  pub format: Container,
  #[serde(default)]
  pub quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
  pub status: &'static str,
  pub filename: String,
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ClipResponse {
  pub message: String,
  pub title: String,
  pub filename: String,
  pub start_time: String,
  pub end_time: String,
}

#[axum::debug_handler]
pub async fn download(
  Json(req): Json<DownloadRequest>,
) -> Result<Json<DownloadResponse>> {
  let result =
    run_download(&Ytdlp::new(), &RetryPolicy::default(), &req).await?;
  info!("downloaded {:?} as {}", result.title, result.filename);
  Ok(Json(DownloadResponse {
    status: "completed",
    filename: result.filename,
    title: result.title,
    duration: result.duration,
  }))
}

#[axum::debug_handler]
pub async fn clip(
  Json(req): Json<ClipRequest>,
) -> Result<Json<ClipResponse>> {
  let response = run_clip(
    &Ytdlp::new(),
    &Clipper::new(),
    &RetryPolicy::default(),
    &req,
  )
  .await?;
  info!("clipped {:?} as {}", response.title, response.filename);
  Ok(Json(response))
}

// Validation happens before anything is spawned: a request this layer
// rejects never reaches the extraction tool.
fn validate_url(raw: &str) -> Result<()> {
  if raw.trim().is_empty() {
    return Err(Error::InvalidInput("video_url must not be empty".into()));
  }
  let parsed = Url::parse(raw)
    .map_err(|e| Error::InvalidInput(format!("malformed video_url: {e}")))?;
  if !matches!(parsed.scheme(), "http" | "https") {
    return Err(Error::InvalidInput(format!(
      "unsupported url scheme {:?}",
      parsed.scheme()
    )));
  }
  Ok(())
}

async fn run_download(
  extractor: &impl Extractor,
  policy: &RetryPolicy,
  req: &DownloadRequest,
) -> Result<DownloadResult> {
  validate_url(&req.video_url)?;

  let token = store::unique_token();
  let spec = FetchSpec {
    url: req.video_url.clone(),
    format_expr: format::selection_expr(req.quality.as_deref()),
    container: req.format,
    output_template: config::download_dir().output_template(&token),
    cookie_file: cookies::cookie_file().map(Path::to_path_buf),
  };

  info!("fetching {}", strip_query(&req.video_url));
  policy.run(|| extractor.fetch(&spec)).await
}

// Full download into a token-named intermediate file, then a stream-copy
// trim; the intermediate never outlives this call.
async fn run_clip(
  extractor: &impl Extractor,
  clipper: &Clipper,
  policy: &RetryPolicy,
  req: &ClipRequest,
) -> Result<ClipResponse> {
  validate_url(&req.video_url)?;
  let range = ClipRange::new(&req.start_time, &req.end_time)?;

  let dir = config::download_dir();
  let token = store::unique_token();
  let spec = FetchSpec {
    url: req.video_url.clone(),
    format_expr: format::selection_expr(req.quality.as_deref()),
    container: req.format,
    output_template: dir.temp_template(&token),
    cookie_file: cookies::cookie_file().map(Path::to_path_buf),
  };

  info!("fetching {} for clipping", strip_query(&req.video_url));
  let fetched = policy.run(|| extractor.fetch(&spec)).await?;
  let source = TempSource::new(dir.base().join(&fetched.filename));

  let clip_name = format!(
    "{} [{}].{}.clip.{}",
    store::sanitize_title(&fetched.title),
    token,
    range.file_tag(),
    req.format.ext()
  );
  let output = dir.base().join(&clip_name);

  clipper.clip(source, &range, &output).await?;

  Ok(ClipResponse {
    message: format!(
      "Clip created from {} to {}",
      range.start.as_str(),
      range.end.as_str()
    ),
    title: fetched.title,
    filename: clip_name,
    start_time: req.start_time.clone(),
    end_time: req.end_time.clone(),
  })
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use async_trait::async_trait;

  use super::*;

  enum Outcome {
    Succeed,
    RateLimit,
  }

  // counts invocations so the short-circuit and attempt-cap properties are
  // observable
  struct MockExtractor {
    calls: AtomicU32,
    outcome: Outcome,
  }

  impl MockExtractor {
    fn new(outcome: Outcome) -> Self {
      Self {
        calls: AtomicU32::new(0),
        outcome,
      }
    }

    fn calls(&self) -> u32 {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Extractor for MockExtractor {
    async fn fetch(&self, _spec: &FetchSpec) -> Result<DownloadResult> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match self.outcome {
        Outcome::Succeed => Ok(DownloadResult {
          title: "Big Buck Bunny".to_string(),
          filename: "Big Buck Bunny [abc] [cafe0123].mp4".to_string(),
          duration: Some(596.0),
          formats: None,
        }),
        Outcome::RateLimit => {
          Err(Error::RateLimited("HTTP Error 429".to_string()))
        }
      }
    }
  }

  fn download_request(url: &str) -> DownloadRequest {
    DownloadRequest {
      video_url: url.to_string(),
      format: Container::Mp4,
      quality: Some("720p".to_string()),
    }
  }

  #[tokio::test]
  async fn empty_url_never_reaches_the_extractor() {
    let mock = MockExtractor::new(Outcome::Succeed);
    let err =
      run_download(&mock, &RetryPolicy::default(), &download_request(""))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(mock.calls(), 0);
  }

  #[tokio::test]
  async fn malformed_url_never_reaches_the_extractor() {
    let mock = MockExtractor::new(Outcome::Succeed);
    for bad in ["not a url", "ftp://example.com/x", "file:///etc/passwd"] {
      let err =
        run_download(&mock, &RetryPolicy::default(), &download_request(bad))
          .await
          .unwrap_err();
      assert!(matches!(err, Error::InvalidInput(_)), "url {bad:?}");
    }
    assert_eq!(mock.calls(), 0);
  }

  #[tokio::test]
  async fn successful_download_reports_metadata() {
    let mock = MockExtractor::new(Outcome::Succeed);
    let req = download_request("https://youtube.com/watch?v=aqz-KE-bpKQ");
    let result = run_download(&mock, &RetryPolicy::default(), &req)
      .await
      .unwrap();

    assert_eq!(mock.calls(), 1);
    assert_eq!(result.title, "Big Buck Bunny");
    assert!(result.filename.ends_with(".mp4"));
  }

  #[tokio::test(start_paused = true)]
  async fn persistent_rate_limit_uses_every_attempt_then_surfaces() {
    let mock = MockExtractor::new(Outcome::RateLimit);
    let req = download_request("https://youtube.com/watch?v=aqz-KE-bpKQ");
    let err = run_download(&mock, &RetryPolicy::new(3, 2.0), &req)
      .await
      .unwrap_err();

    assert_eq!(mock.calls(), 3);
    assert!(matches!(err, Error::RateLimited(_)));
    assert_eq!(err.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
  }

  fn clip_request(url: &str, start: &str, end: &str) -> ClipRequest {
    ClipRequest {
      video_url: url.to_string(),
      start_time: start.to_string(),
      end_time: end.to_string(),
      format: Container::Mp4,
      quality: None,
    }
  }

  #[tokio::test]
  async fn bad_time_range_never_reaches_the_extractor() {
    let mock = MockExtractor::new(Outcome::Succeed);
    let clipper = Clipper::new();
    let url = "https://youtube.com/watch?v=aqz-KE-bpKQ";

    for (start, end) in [
      ("oops", "00:01:10"),
      ("00:01:00", ""),
      ("00:01:10", "00:01:00"),
      ("00:01:00", "00:01:00"),
    ] {
      let err = run_clip(
        &mock,
        &clipper,
        &RetryPolicy::default(),
        &clip_request(url, start, end),
      )
      .await
      .unwrap_err();
      assert!(
        matches!(err, Error::InvalidInput(_)),
        "range {start:?}..{end:?}"
      );
    }
    assert_eq!(mock.calls(), 0);
  }

  #[test]
  fn clip_filenames_carry_timestamps_and_suffix() {
    let range = ClipRange::new("00:01:00", "00:01:10").unwrap();
    let name = format!(
      "{} [{}].{}.clip.{}",
      store::sanitize_title("Big Buck Bunny"),
      "cafe0123",
      range.file_tag(),
      Container::Mp4.ext()
    );
    assert_eq!(
      name,
      "Big Buck Bunny [cafe0123].00-01-00-00-01-10.clip.mp4"
    );
    assert!(name.ends_with(".clip.mp4"));
  }
}
