use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::{Error, Result};

// Owns the output directory. Filenames are produced internally (sanitized
// title plus a per-request token) and resolved strictly within the base
// directory on the way back out.
pub struct DownloadDir {
  base: PathBuf,
}

impl DownloadDir {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }

  pub fn ensure(&self) -> Result<()> {
    std::fs::create_dir_all(&self.base)?;
    Ok(())
  }

  pub fn base(&self) -> &Path {
    &self.base
  }

  // Rejects anything that is not a single plain filename, regardless of
  // what the underlying filesystem would make of it.
  pub fn resolve(&self, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    let ok = matches!(
      (components.next(), components.next()),
      (Some(Component::Normal(_)), None)
    );
    if !ok || name.contains('\\') {
      return Err(Error::InvalidInput(format!("illegal filename: {name:?}")));
    }
    Ok(self.base.join(name))
  }

  // yt-dlp output template for a full download; the token keeps concurrent
  // requests for identically-titled videos from colliding
  pub fn output_template(&self, token: &str) -> String {
    self
      .base
      .join(format!("%(title)s [%(id)s] [{token}].%(ext)s"))
      .display()
      .to_string()
  }

  // template for the intermediate file a clip is cut from
  pub fn temp_template(&self, token: &str) -> String {
    self
      .base
      .join(format!(".tmp-{token}.%(ext)s"))
      .display()
      .to_string()
  }
}

pub fn unique_token() -> String {
  Uuid::new_v4().simple().to_string()[..8].to_string()
}

// Title-derived filenames keep alphanumerics, spaces, dots, dashes and
// underscores; everything else is dropped.
pub fn sanitize_title(title: &str) -> String {
  let cleaned: String = title
    .chars()
    .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
    .collect();
  let cleaned = cleaned.trim();
  if cleaned.is_empty() {
    "video".to_string()
  } else {
    cleaned.to_string()
  }
}
