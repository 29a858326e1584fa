use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::config::{EXTRACTION_TIMEOUT, YTDLP_SEMAPHORE};
use crate::util::{diagnostic_tail, strip_query};
use crate::{Error, Result};

use super::{DownloadResult, Extractor, FetchSpec};

// run the yt-dlp command line to download the selected streams and report
// the resolved metadata. requires yt-dlp executable to be in PATH.
pub struct Ytdlp {
  program: String,
}

// sent on every request so the extraction endpoints see an ordinary browser
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

impl Ytdlp {
  pub fn new() -> Self {
    Self {
      program: "yt-dlp".to_string(),
    }
  }
}

impl Default for Ytdlp {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn fetch(&self, spec: &FetchSpec) -> Result<DownloadResult> {
    let args = build_args(spec);
    debug!("invoking {} for {}", self.program, strip_query(&spec.url));

    let permit = YTDLP_SEMAPHORE.acquire().await.unwrap();
    let child = Command::new(&self.program)
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()?;
    let output =
      tokio::time::timeout(*EXTRACTION_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
          Error::Extraction(format!(
            "extraction timed out after {}s",
            EXTRACTION_TIMEOUT.as_secs()
          ))
        })??;
    drop(permit);

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(classify_stderr(&stderr));
    }

    let info: VideoInfo = serde_json::from_slice(&output.stdout)?;
    into_result(info)
  }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
  title: String,
  #[serde(default)]
  duration: Option<f64>,
  #[serde(default)]
  formats: Vec<FormatInfo>,
  #[serde(default)]
  requested_downloads: Vec<RequestedDownload>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
  format_id: String,
}

#[derive(Debug, Deserialize)]
struct RequestedDownload {
  filepath: String,
}

fn into_result(info: VideoInfo) -> Result<DownloadResult> {
  let filepath = info
    .requested_downloads
    .first()
    .map(|d| d.filepath.clone())
    .ok_or_else(|| {
      Error::Extraction("tool reported no downloaded file".to_string())
    })?;

  let path = Path::new(&filepath);
  if !path.exists() {
    return Err(Error::Extraction(format!(
      "output file missing: {filepath}"
    )));
  }

  let filename = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .ok_or_else(|| {
      Error::Extraction(format!("unusable output path: {filepath}"))
    })?;

  let formats = if info.formats.is_empty() {
    None
  } else {
    Some(info.formats.into_iter().map(|f| f.format_id).collect())
  };

  Ok(DownloadResult {
    title: info.title,
    filename,
    duration: info.duration,
    formats,
  })
}

// One process does it all: downloads the selected streams and dumps the
// info json on stdout (--no-simulate keeps -J from skipping the download).
fn build_args(spec: &FetchSpec) -> Vec<String> {
  let mut args: Vec<String> = vec![
    "--dump-single-json".into(),
    "--no-simulate".into(),
    "--no-progress".into(),
    "--no-playlist".into(),
    "--no-warnings".into(),
    "--no-mtime".into(),
    "-f".into(),
    spec.format_expr.clone(),
    "--merge-output-format".into(),
    spec.container.ext().into(),
    "-o".into(),
    spec.output_template.clone(),
    "--socket-timeout".into(),
    "30".into(),
    "--retries".into(),
    "3".into(),
    "--fragment-retries".into(),
    "3".into(),
    "--no-check-certificate".into(),
    "--user-agent".into(),
    USER_AGENT.into(),
    "--add-headers".into(),
    "Accept-Language:en-US,en;q=0.9".into(),
  ];

  if let Some(cookie_file) = &spec.cookie_file {
    args.push("--cookies".into());
    args.push(cookie_file.display().to_string());
  }

  args.push(spec.url.clone());
  args
}

// The tool reports failures as opaque stderr text; match the known
// signatures here, nearest the origin, so the rest of the service deals in
// classifications instead of string-sniffing.
fn classify_stderr(stderr: &str) -> Error {
  let lower = stderr.to_lowercase();
  let tail = diagnostic_tail(stderr);

  if lower.contains("429")
    || lower.contains("too many requests")
    || lower.contains("rate-limit")
    || lower.contains("rate limit")
  {
    return Error::RateLimited(tail);
  }
  if lower.contains("403")
    || lower.contains("forbidden")
    || lower.contains("access denied")
    || lower.contains("sign in")
    || lower.contains("not a bot")
    || lower.contains("login required")
  {
    return Error::AccessDenied(tail);
  }
  if lower.contains("video unavailable")
    || lower.contains("private video")
    || lower.contains("has been removed")
    || lower.contains("404")
    || lower.contains("not available in your country")
    || lower.contains("geo restricted")
    || lower.contains("does not exist")
  {
    return Error::Unavailable(tail);
  }

  Error::Extraction(tail)
}
