use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{info, warn};

use crate::util::diagnostic_tail;
use crate::{Error, Result};

// "HH:MM:SS" offset into the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
  text: String,
  seconds: u32,
}

static TIMESTAMP_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(\d{2}):([0-5]\d):([0-5]\d)$").unwrap());

impl Timestamp {
  pub fn parse(s: &str) -> Result<Self> {
    let caps = TIMESTAMP_RE.captures(s.trim()).ok_or_else(|| {
      Error::InvalidInput(format!("malformed timestamp {s:?}, want HH:MM:SS"))
    })?;
    // the regex admits digits only, so these parses cannot fail
    let hours: u32 = caps[1].parse().unwrap();
    let minutes: u32 = caps[2].parse().unwrap();
    let seconds: u32 = caps[3].parse().unwrap();
    Ok(Self {
      text: s.trim().to_string(),
      seconds: hours * 3600 + minutes * 60 + seconds,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.text
  }

  pub fn total_seconds(&self) -> u32 {
    self.seconds
  }

  // colon-free form for embedding in filenames
  pub fn file_tag(&self) -> String {
    self.text.replace(':', "-")
  }
}

#[derive(Debug, Clone)]
pub struct ClipRange {
  pub start: Timestamp,
  pub end: Timestamp,
}

impl ClipRange {
  pub fn new(start: &str, end: &str) -> Result<Self> {
    let start = Timestamp::parse(start)?;
    let end = Timestamp::parse(end)?;
    if end.total_seconds() <= start.total_seconds() {
      return Err(Error::InvalidInput(format!(
        "end_time {} must be after start_time {}",
        end.as_str(),
        start.as_str()
      )));
    }
    Ok(Self { start, end })
  }

  pub fn file_tag(&self) -> String {
    format!("{}-{}", self.start.file_tag(), self.end.file_tag())
  }
}

// Owns the fully-downloaded intermediate file a clip is cut from. Dropping
// the guard removes the file, so cleanup holds on the error paths too;
// a failed deletion is logged and otherwise ignored.
pub struct TempSource {
  path: PathBuf,
}

impl TempSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for TempSource {
  fn drop(&mut self) {
    if !self.path.exists() {
      return;
    }
    if let Err(e) = std::fs::remove_file(&self.path) {
      warn!("failed to delete temp source {}: {e}", self.path.display());
    }
  }
}

// run the ffmpeg command line to cut a time range out of a downloaded file
// without re-encoding. requires ffmpeg executable to be in PATH.
pub struct Clipper {
  program: String,
}

impl Clipper {
  pub fn new() -> Self {
    Self {
      program: "ffmpeg".to_string(),
    }
  }

  #[cfg(test)]
  fn with_program(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  // Consumes the source guard: whatever happens below, the intermediate
  // file is gone when this returns.
  pub async fn clip(
    &self,
    source: TempSource,
    range: &ClipRange,
    output: &Path,
  ) -> Result<()> {
    let result = Command::new(&self.program)
      .arg("-nostdin")
      .arg("-y")
      .arg("-i")
      .arg(source.path())
      .arg("-ss")
      .arg(range.start.as_str())
      .arg("-to")
      .arg(range.end.as_str())
      .arg("-c")
      .arg("copy")
      .arg(output)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .output()
      .await?;

    if !result.status.success() {
      let stderr = String::from_utf8_lossy(&result.stderr);
      return Err(Error::ToolFailure(diagnostic_tail(&stderr)));
    }
    if !output.exists() {
      return Err(Error::ToolFailure(
        "transcoder exited cleanly but produced no output".to_string(),
      ));
    }

    info!(
      "clipped {} -> {}",
      source.path().display(),
      output.display()
    );
    Ok(())
  }
}

impl Default for Clipper {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_well_formed_timestamps() {
    let t = Timestamp::parse("01:02:03").unwrap();
    assert_eq!(t.total_seconds(), 3723);
    assert_eq!(t.as_str(), "01:02:03");
    assert_eq!(t.file_tag(), "01-02-03");
  }

  #[test]
  fn rejects_malformed_timestamps() {
    for bad in ["", "1:2:3", "00:99:00", "00:00:61", "0a:00:00", "00-01-00"] {
      assert!(
        matches!(Timestamp::parse(bad), Err(Error::InvalidInput(_))),
        "expected {bad:?} to be rejected"
      );
    }
  }

  #[test]
  fn range_requires_end_after_start() {
    assert!(ClipRange::new("00:01:00", "00:01:10").is_ok());
    assert!(matches!(
      ClipRange::new("00:01:10", "00:01:00"),
      Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
      ClipRange::new("00:01:00", "00:01:00"),
      Err(Error::InvalidInput(_))
    ));
  }

  #[test]
  fn range_file_tag_has_no_colons() {
    let range = ClipRange::new("00:01:00", "00:01:10").unwrap();
    assert_eq!(range.file_tag(), "00-01-00-00-01-10");
  }

  fn touch(path: &Path) {
    std::fs::write(path, b"intermediate bytes").unwrap();
  }

  #[cfg(unix)]
  fn stub_transcoder(dir: &Path) -> String {
    use std::os::unix::fs::PermissionsExt;
    // copies the -i argument to the last argument, like a trim that works
    let script = dir.join("stub-ffmpeg.sh");
    std::fs::write(
      &script,
      "#!/bin/sh\n\
       in=\"\"; prev=\"\"; out=\"\"\n\
       for a in \"$@\"; do\n\
         [ \"$prev\" = \"-i\" ] && in=$a\n\
         prev=$a; out=$a\n\
       done\n\
       cp -- \"$in\" \"$out\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
      .unwrap();
    script.display().to_string()
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn clip_copies_range_and_removes_source() {
    let dir = tempfile::tempdir().unwrap();
    let temp_path = dir.path().join(".tmp-cafe0123.mp4");
    touch(&temp_path);
    let output = dir.path().join("clip.mp4");
    let range = ClipRange::new("00:01:00", "00:01:10").unwrap();

    let clipper = Clipper::with_program(stub_transcoder(dir.path()));
    clipper
      .clip(TempSource::new(&temp_path), &range, &output)
      .await
      .unwrap();

    assert!(output.exists());
    assert!(!temp_path.exists(), "temp source must be cleaned up");
  }

  #[tokio::test]
  async fn clip_failure_still_removes_source() {
    let dir = tempfile::tempdir().unwrap();
    let temp_path = dir.path().join(".tmp-cafe0123.mp4");
    touch(&temp_path);
    let output = dir.path().join("clip.mp4");
    let range = ClipRange::new("00:01:00", "00:01:10").unwrap();

    // `false` exits non-zero without writing anything
    let clipper = Clipper::with_program("false");
    let err = clipper
      .clip(TempSource::new(&temp_path), &range, &output)
      .await
      .unwrap_err();

    assert!(matches!(err, Error::ToolFailure(_)));
    assert!(!output.exists());
    assert!(!temp_path.exists(), "temp source must be cleaned up on error");
  }

  #[tokio::test]
  async fn clean_exit_without_output_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let temp_path = dir.path().join(".tmp-cafe0123.mp4");
    touch(&temp_path);
    let output = dir.path().join("clip.mp4");
    let range = ClipRange::new("00:01:00", "00:01:10").unwrap();

    // `true` exits zero but produces no file
    let clipper = Clipper::with_program("true");
    let err = clipper
      .clip(TempSource::new(&temp_path), &range, &output)
      .await
      .unwrap_err();

    assert!(matches!(err, Error::ToolFailure(_)));
    assert!(!temp_path.exists());
  }

  #[tokio::test]
  async fn missing_transcoder_surfaces_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let temp_path = dir.path().join(".tmp-cafe0123.mp4");
    touch(&temp_path);
    let range = ClipRange::new("00:01:00", "00:01:10").unwrap();

    let clipper = Clipper::with_program("definitely-not-a-real-transcoder");
    let err = clipper
      .clip(
        TempSource::new(&temp_path),
        &range,
        &dir.path().join("clip.mp4"),
      )
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(!temp_path.exists());
  }
}
