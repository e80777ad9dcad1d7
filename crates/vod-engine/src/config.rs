use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Referer expected by the media host for pages, playlists, keys and segments.
pub const DEFAULT_REFERER: &str = "https://kwik.cx";

/// Maximum number of segments fetched at the same time for one episode.
pub const DEFAULT_SEGMENT_CONCURRENCY: usize = 7;

/// A segment is handed back to the pool while its attempt counter stays at or below this.
pub const DEFAULT_MAX_SEGMENT_ATTEMPTS: u32 = 3;

/// Configurable options for the downloader
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single HTTP request.
    ///
    /// Zero leaves the transport default in place (no timeout).
    pub timeout: Duration,

    /// Connection timeout (zero = transport default)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Referer header sent with every request
    pub referer: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Max concurrent segment downloads
    pub segment_concurrency: usize,

    /// Retry ceiling per segment
    pub max_segment_attempts: u32,

    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: Duration::ZERO,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            referer: DEFAULT_REFERER.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            segment_concurrency: DEFAULT_SEGMENT_CONCURRENCY,
            max_segment_attempts: DEFAULT_MAX_SEGMENT_ATTEMPTS,
            pool_max_idle_per_host: DEFAULT_SEGMENT_CONCURRENCY,
        }
    }
}

impl DownloaderConfig {
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Merge custom headers over the defaults; custom values win for the same name.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pool_limits() {
        let config = DownloaderConfig::default();
        assert_eq!(config.segment_concurrency, 7);
        assert_eq!(config.max_segment_attempts, 3);
        assert!(config.timeout.is_zero());
    }

    #[test]
    fn custom_headers_override_defaults() {
        let mut custom = HeaderMap::new();
        custom.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja-JP"),
        );
        let config = DownloaderConfig::default().with_headers(custom);
        assert_eq!(
            config.headers.get(reqwest::header::ACCEPT_LANGUAGE).unwrap(),
            "ja-JP"
        );
        assert!(config.headers.contains_key(reqwest::header::CONNECTION));
    }
}
