//! Remux engines turning a finished working directory into the output container.

mod ffmpeg;
pub mod utils;

pub use ffmpeg::{FfmpegConfig, FfmpegMuxer};

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Remuxes a local playlist (and its key) into a single container file.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Produce `output` from `playlist`; `key` is the key file the playlist refers to.
    ///
    /// `on_progress` receives `clamp(elapsed / duration, 0, 1)` as the remux advances.
    async fn mux(
        &self,
        playlist: &Path,
        key: &Path,
        output: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()>;
}
