use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::store::DownloadDir;

pub static PORT: LazyLock<u16> = LazyLock::new(|| {
  std::env::var("PORT")
    .ok()
    .and_then(|s| s.parse::<u16>().ok())
    .unwrap_or(8000)
});

static DOWNLOAD_DIR: LazyLock<DownloadDir> = LazyLock::new(|| {
  let base = std::env::var("DOWNLOADS_DIR")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("downloads"));
  DownloadDir::new(base)
});

pub fn download_dir() -> &'static DownloadDir {
  &DOWNLOAD_DIR
}

// ensure only a limited set of extraction processes at a time
pub static YTDLP_SEMAPHORE: LazyLock<Semaphore> = LazyLock::new(|| {
  let concurrency = std::env::var("YTDLP_CONCURRENCY")
    .ok()
    .and_then(|s| s.parse::<usize>().ok())
    .unwrap_or(2);
  Semaphore::new(concurrency)
});

// overall deadline for one extraction-tool run; the tool's own socket
// timeout only bounds individual reads
pub static EXTRACTION_TIMEOUT: LazyLock<Duration> = LazyLock::new(|| {
  let secs = std::env::var("EXTRACTION_TIMEOUT_SECS")
    .ok()
    .and_then(|s| s.parse::<u64>().ok())
    .unwrap_or(900);
  Duration::from_secs(secs)
});
