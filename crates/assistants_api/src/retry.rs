use std::sync::OnceLock;

use regex::Regex;

fn retryable_status_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused|server.?error")
            .expect("retry regex must compile")
    })
}

/// Error text classification for transient failures and retryable statuses.
///
/// Only meaningful for idempotent reads; mutating calls are never repeated.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504) || retryable_status_regex().is_match(error_text)
}
