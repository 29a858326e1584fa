mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::format::Container;
use crate::Result;

pub use ytdlp::Ytdlp;

// One fetch job: what to pull, how to select streams, where to write.
// Built once per request and immutable from then on.
#[derive(Debug, Clone)]
pub struct FetchSpec {
  pub url: String,
  pub format_expr: String,
  pub container: Container,
  pub output_template: String,
  pub cookie_file: Option<PathBuf>,
}

// resolved metadata for a completed fetch
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
  pub title: String,
  pub filename: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub formats: Option<Vec<String>>,
}

// Invokes the external extraction tool exactly once per call; resilience
// policy lives in the retry layer, never here.
#[async_trait]
pub trait Extractor: Send + Sync {
  async fn fetch(&self, spec: &FetchSpec) -> Result<DownloadResult>;
}
