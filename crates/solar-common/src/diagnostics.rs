//! Helpers for log context.

/// Characters of a URL kept in log fields; signed provider URLs are long
/// and carry API keys near the end.
pub const LOG_URL_PREFIX_CHARS: usize = 100;

/// First [`LOG_URL_PREFIX_CHARS`] characters of `url`, with `...` when cut.
pub fn url_prefix(url: &str) -> String {
    match url.char_indices().nth(LOG_URL_PREFIX_CHARS) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_url_unchanged() {
        assert_eq!(url_prefix("https://a/b"), "https://a/b");
    }

    #[test]
    fn test_long_url_truncated() {
        let url = format!("https://solar.googleapis.com/{}", "x".repeat(200));
        let p = url_prefix(&url);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), LOG_URL_PREFIX_CHARS + 3);
    }
}
