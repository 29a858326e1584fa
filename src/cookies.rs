use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{info, warn};

// Session cookies arrive as a base64-encoded Netscape cookie file in the
// environment. They are materialized exactly once, at first use, into a
// file the extraction tool reads; the file lives for the whole process and
// is never rewritten per request.
pub const COOKIES_ENV: &str = "COOKIES_B64";

// a usable cookie file carries the domain, login-state and visitor-state
// markers; anything less is treated as "no credentials"
const REQUIRED_MARKERS: &[&str] =
  &[".youtube.com", "LOGIN_INFO", "VISITOR_INFO1_LIVE"];

static COOKIE_FILE: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
  let blob = std::env::var(COOKIES_ENV).ok();
  let target = std::env::temp_dir()
    .join(format!("clipfetch-cookies-{}.txt", std::process::id()));
  provision(blob.as_deref(), &target)
});

pub fn cookie_file() -> Option<&'static Path> {
  COOKIE_FILE.as_deref()
}

// Decode, validate and write the cookie blob. Every failure downgrades to
// unauthenticated operation; the decoded content itself stays out of the
// logs.
pub fn provision(blob: Option<&str>, target: &Path) -> Option<PathBuf> {
  let blob = blob?;

  let decoded = match BASE64.decode(blob.trim()) {
    Ok(bytes) => bytes,
    Err(e) => {
      warn!("cookie blob is not valid base64 ({e}), continuing without");
      return None;
    }
  };
  let text = match String::from_utf8(decoded) {
    Ok(text) => text,
    Err(_) => {
      warn!("cookie blob is not utf-8 text, continuing without");
      return None;
    }
  };

  if let Some(missing) = missing_marker(&text) {
    warn!("cookie blob lacks the {missing} marker, continuing without");
    return None;
  }

  if let Err(e) = write_restricted(target, &text) {
    warn!("failed to write cookie file: {e}, continuing without");
    return None;
  }

  info!(
    "provisioned cookie file at {} ({} bytes)",
    target.display(),
    text.len()
  );
  Some(target.to_path_buf())
}

fn missing_marker(text: &str) -> Option<&'static str> {
  REQUIRED_MARKERS
    .iter()
    .find(|marker| !text.contains(**marker))
    .copied()
}

fn write_restricted(target: &Path, text: &str) -> std::io::Result<()> {
  std::fs::write(target, text)?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o600))?;
  }
  Ok(())
}
