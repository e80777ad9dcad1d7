//! One episode, from catalog lookup to a verified output file.

use std::path::Path;
use std::sync::Arc;

use stream_resolver::StreamResolver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use vod_engine::hls::{PlaylistSession, SegmentPool, prepare_working_dir};
use vod_engine::{DownloaderConfig, HttpFetch};

use super::library::SeriesLibrary;
use super::status::{StatusEvent, StatusReporter};
use crate::catalog::{Catalog, resolve_tape};
use crate::downloader::{Muxer, VariantPreference, VariantSelector};
use crate::{EpisodeError, Error};

/// A queued request for one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeTask {
    pub episode: u32,
    pub preference: VariantPreference,
}

/// Collaborators shared by every series.
#[derive(Clone)]
pub struct ExtractionEngine {
    pub resolver: Arc<dyn StreamResolver>,
    pub fetch: Arc<dyn HttpFetch>,
    pub muxer: Arc<dyn Muxer>,
    pub downloader: DownloaderConfig,
    pub selector: VariantSelector,
}

impl ExtractionEngine {
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        fetch: Arc<dyn HttpFetch>,
        muxer: Arc<dyn Muxer>,
        downloader: DownloaderConfig,
    ) -> Self {
        Self {
            resolver,
            fetch,
            muxer,
            downloader,
            selector: VariantSelector::new(),
        }
    }

    /// Run `task` to completion.
    ///
    /// The working directory `.data/<episode>` survives every failure so the
    /// next attempt resumes from the segments already on disk.
    #[instrument(skip_all, fields(series = %reporter.series(), episode = task.episode))]
    pub async fn extract(
        &self,
        catalog: &dyn Catalog,
        library: &SeriesLibrary,
        task: &EpisodeTask,
        reporter: &StatusReporter,
        token: &CancellationToken,
    ) -> Result<(), EpisodeError> {
        let (root, tape) = resolve_tape(catalog, task.episode)
            .await?
            .ok_or(EpisodeError::Dropped(task.episode))?;

        let label = tape.label(root);
        let output = library.output_path(&label);
        let work_dir = library.working_dir(task.episode);

        if exists(&output).await? {
            if is_dir(&work_dir).await {
                debug!(output = %output.display(), "Removing partial output before resuming");
                tokio::fs::remove_file(&output).await?;
            } else {
                return Err(EpisodeError::AlreadyComplete(format!("{label}.mp4")));
            }
        }

        let options = catalog.fetch_variant_options(&tape.session).await?;
        let (_, variant) = self.selector.select(&options, &task.preference)?;
        reporter.emit(StatusEvent::Option {
            audio: variant.audio.clone(),
            quality: variant.quality,
        });
        reporter.progress(0.0);

        let stream_url = self.resolver.resolve(&variant.url).await?;

        prepare_working_dir(&work_dir).await?;
        let mut session = PlaylistSession::new(&work_dir, Arc::clone(&self.fetch));
        session.load().await?;
        let outcome = session.resolve(&stream_url, false).await?;
        debug!(?outcome, "Session resolved");

        if !session.pending_segments().await.is_empty() {
            reporter.emit(StatusEvent::Current(Some(task.episode)));
            reporter.emit(StatusEvent::Start);
        }

        let on_progress = |value: f64| reporter.progress(value);
        SegmentPool::new(&self.downloader)
            .with_cancellation(token.clone())
            .run(&mut session, &on_progress)
            .await?;

        let paths = session.paths();
        self.muxer
            .mux(&paths.playlist(), &paths.key(), &output, &on_progress)
            .await?;

        if !exists(&output).await? {
            return Err(Error::Other("output file doesn't exist".to_owned()).into());
        }

        tokio::fs::remove_dir_all(&work_dir).await?;
        info!(output = %output.display(), audio = %variant.audio, quality = variant.quality, "Episode extracted");
        Ok(())
    }
}

async fn exists(path: &Path) -> Result<bool, EpisodeError> {
    Ok(tokio::fs::try_exists(path).await?)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
