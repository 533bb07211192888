use crate::error::{MediaError, Result};
use url::Url;

const DEFAULT_STREAM_TITLE: &str = "Network Stream";

/// Accepts only absolute http(s) addresses. Returns the trimmed input.
pub fn validate_stream_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MediaError::InvalidStreamUrl(String::from("please enter a url")));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| MediaError::InvalidStreamUrl(format!("{trimmed}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(MediaError::InvalidStreamUrl(format!(
            "unsupported scheme {other}"
        ))),
    }
}

/// Display title for a stream: its last path segment, if any.
pub fn stream_title(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| String::from(DEFAULT_STREAM_TITLE))
}
