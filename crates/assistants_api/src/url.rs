use reqwest::Url;

use crate::error::AssistantsApiError;

/// Default base URL for Assistants API requests.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Join a base URL and an endpoint path.
///
/// Normalization rules:
/// 1) an empty base falls back to [`DEFAULT_BASE_URL`]
/// 2) trailing slashes on the base and leading slashes on the path collapse to one
pub fn endpoint_url(base: &str, path: &str) -> String {
    let base = if base.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base.trim()
    };

    let trimmed = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return trimmed.to_string();
    }
    format!("{trimmed}/{path}")
}

/// Join a base URL and path segments, percent-encoding each segment.
///
/// A `/` inside a segment is encoded, and bare `.` or `..` segments are dropped.
pub fn segments_url(base: &str, segments: &[&str]) -> Result<Url, AssistantsApiError> {
    let base = endpoint_url(base, "");
    let mut url = Url::parse(&base)
        .map_err(|error| AssistantsApiError::InvalidUrl(format!("{base}: {error}")))?;
    url.path_segments_mut()
        .map_err(|()| AssistantsApiError::InvalidUrl(format!("{base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
