use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("unexpected content type `{content_type}` during {operation} for {url}")]
    ContentType {
        content_type: String,
        url: String,
        operation: &'static str,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error("key fetch error: {reason}")]
    KeyFetch { reason: String },

    #[error("{failed} segment(s) failed after exhausting retries")]
    SegmentFailure { failed: usize },

    #[error("session state error: {reason}")]
    SessionState { reason: String },

    #[error("`{path}` is occupied by something that is not a directory")]
    FileSystemConflict { path: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl DownloadError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn content_type(
        content_type: impl Into<String>,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::ContentType {
            content_type: content_type.into(),
            url: url.into(),
            operation,
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn key_fetch(reason: impl Into<String>) -> Self {
        Self::KeyFetch {
            reason: reason.into(),
        }
    }

    pub fn session_state(reason: impl Into<String>) -> Self {
        Self::SessionState {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_name_the_operation() {
        let err = DownloadError::http_status(StatusCode::BAD_GATEWAY, "https://a/b", "segment");
        assert_eq!(
            err.to_string(),
            "request failed with HTTP 502 Bad Gateway during segment for https://a/b"
        );
    }

    #[test]
    fn segment_failure_names_count() {
        let err = DownloadError::SegmentFailure { failed: 2 };
        assert_eq!(
            err.to_string(),
            "2 segment(s) failed after exhausting retries"
        );
    }
}
