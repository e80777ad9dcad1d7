//! Application-wide error types.

use stream_resolver::ResolveError;
use thiserror::Error;
use vod_engine::DownloadError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("couldn't determine best match: no variants available")]
    NoVariants,

    #[error("Mux error: {0}")]
    Mux(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// How the queue reacts to a failed episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Report an error and put the task back on the stack.
    Requeue,
    /// Report a warning and forget the task.
    Warn,
    /// Put the task back and stop the worker.
    Abort,
}

/// Outcome of one episode that did not complete.
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("episode {0} dropped")]
    Dropped(u32),

    #[error("'{0}' already exists, ignored")]
    AlreadyComplete(String),

    #[error(transparent)]
    Failed(#[from] Error),
}

impl From<DownloadError> for EpisodeError {
    fn from(err: DownloadError) -> Self {
        EpisodeError::Failed(err.into())
    }
}

impl From<ResolveError> for EpisodeError {
    fn from(err: ResolveError) -> Self {
        EpisodeError::Failed(err.into())
    }
}

impl From<std::io::Error> for EpisodeError {
    fn from(err: std::io::Error) -> Self {
        EpisodeError::Failed(err.into())
    }
}

impl EpisodeError {
    pub fn disposition(&self) -> Disposition {
        match self {
            EpisodeError::Dropped(_) | EpisodeError::AlreadyComplete(_) => Disposition::Warn,
            EpisodeError::Failed(err) => match err {
                Error::Download(DownloadError::Cancelled) => Disposition::Abort,
                Error::Download(
                    DownloadError::FileSystemConflict { .. } | DownloadError::Playlist { .. },
                )
                | Error::Mux(_) => Disposition::Warn,
                _ => Disposition::Requeue,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispositions() {
        assert_eq!(EpisodeError::Dropped(4).disposition(), Disposition::Warn);
        assert_eq!(
            EpisodeError::AlreadyComplete("4.mp4".into()).disposition(),
            Disposition::Warn
        );
        assert_eq!(
            EpisodeError::from(DownloadError::SegmentFailure { failed: 1 }).disposition(),
            Disposition::Requeue
        );
        assert_eq!(
            EpisodeError::from(DownloadError::key_fetch("gone")).disposition(),
            Disposition::Requeue
        );
        assert_eq!(
            EpisodeError::from(DownloadError::playlist("no segments")).disposition(),
            Disposition::Warn
        );
        assert_eq!(
            EpisodeError::from(ResolveError::NoStreamUrl).disposition(),
            Disposition::Requeue
        );
        assert_eq!(
            EpisodeError::Failed(Error::mux("exit 1")).disposition(),
            Disposition::Warn
        );
        assert_eq!(
            EpisodeError::from(DownloadError::Cancelled).disposition(),
            Disposition::Abort
        );
    }

    #[test]
    fn messages_read_like_status_lines() {
        assert_eq!(EpisodeError::Dropped(12).to_string(), "episode 12 dropped");
        assert_eq!(
            EpisodeError::AlreadyComplete("1-2.mp4".into()).to_string(),
            "'1-2.mp4' already exists, ignored"
        );
    }
}
