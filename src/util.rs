// Trim tool stderr down to the most informative part for error payloads:
// the last explicit error line if the tool printed one, otherwise the tail
// of the output.
pub fn diagnostic_tail(stderr: &str) -> String {
  if let Some(line) = stderr
    .lines()
    .rev()
    .find(|l| l.trim_start().to_lowercase().starts_with("error"))
  {
    return line.trim().to_string();
  }

  let trimmed = stderr.trim();
  match trimmed.char_indices().rev().nth(399) {
    Some((i, _)) => trimmed[i..].to_string(),
    None => trimmed.to_string(),
  }
}

// used to keep video ids and tokens out of the logs
pub fn strip_query(url: &str) -> &str {
  match url.find('?') {
    Some(i) => &url[..i],
    None => url,
  }
}
