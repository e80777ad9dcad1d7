use thiserror::Error;
use vod_engine::DownloadError;

use crate::js_engine::JsError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to fetch episode page: {0}")]
    Fetch(#[from] DownloadError),
    #[error("unexpected page shape: {0}")]
    PageShape(String),
    #[error("script evaluation failed: {0}")]
    Script(#[from] JsError),
    #[error("no playlist URL in unpacked script")]
    NoStreamUrl,
    #[error("script worker failed: {0}")]
    Worker(String),
}
