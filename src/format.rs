use serde::Deserialize;

// Named resolution buckets and the height each one caps the video stream
// at. Anything not in the table gets the 720p default.
const QUALITY_TIERS: &[(&str, u32)] = &[
  ("2160p", 2160),
  ("1440p", 1440),
  ("1080p", 1080),
  ("720p", 720),
  ("480p", 480),
  ("360p", 360),
];

const DEFAULT_HEIGHT: u32 = 720;

// yt-dlp format-selection expression: best video capped at the tier height
// plus best audio, falling back to a capped combined stream, then anything.
pub fn selection_expr(tier: Option<&str>) -> String {
  let height = tier
    .and_then(|t| {
      QUALITY_TIERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(t.trim()))
        .map(|(_, h)| *h)
    })
    .unwrap_or(DEFAULT_HEIGHT);
  format!("bv*[height<={height}]+ba/b[height<={height}]/b")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
  #[default]
  Mp4,
  Webm,
  Mkv,
}

impl Container {
  pub fn ext(&self) -> &'static str {
    match self {
      Container::Mp4 => "mp4",
      Container::Webm => "webm",
      Container::Mkv => "mkv",
    }
  }
}
