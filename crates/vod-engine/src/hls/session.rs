use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::DownloadError;
use crate::client::{ContentCheck, HttpFetch};
use crate::hls::playlist::{LOCAL_KEY_NAME, VodPlaylist};
use crate::hls::status::{SegmentEntry, SegmentMap, SessionMetadata, read_status, write_status};

/// File layout of one episode working directory.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    dir: PathBuf,
}

impl SessionPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn status(&self) -> PathBuf {
        self.dir.join("status")
    }

    pub fn playlist(&self) -> PathBuf {
        self.dir.join(".m3u8")
    }

    pub fn key(&self) -> PathBuf {
        self.dir.join(LOCAL_KEY_NAME)
    }

    pub fn segment(&self, index: usize) -> PathBuf {
        self.dir.join(index.to_string())
    }
}

/// Create `dir` (and parents) unless it already exists as a directory.
///
/// Something other than a directory at that path is a [`DownloadError::FileSystemConflict`].
pub async fn prepare_working_dir(dir: &Path) -> Result<(), DownloadError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(DownloadError::FileSystemConflict {
            path: dir.display().to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(dir).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// What a call to [`PlaylistSession::resolve`] did with prior progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Done/attempt flags were carried over.
    Resumed,
    /// Nothing usable was on disk.
    Fresh,
    /// Prior progress belonged to a different stream, key or segment count and was discarded.
    Rebuilt,
    /// The caller asked to discard prior progress.
    Forced,
}

/// Resumable on-disk state of one playlist download.
pub struct PlaylistSession {
    paths: SessionPaths,
    fetch: Arc<dyn HttpFetch>,
    segments: SegmentMap,
    metadata: Option<SessionMetadata>,
}

impl PlaylistSession {
    pub fn new(dir: impl Into<PathBuf>, fetch: Arc<dyn HttpFetch>) -> Self {
        Self {
            paths: SessionPaths::new(dir),
            fetch,
            segments: SegmentMap::new(),
            metadata: None,
        }
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn segments(&self) -> &SegmentMap {
        &self.segments
    }

    pub(crate) fn segments_mut(&mut self) -> &mut SegmentMap {
        &mut self.segments
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    pub fn fetcher(&self) -> Arc<dyn HttpFetch> {
        Arc::clone(&self.fetch)
    }

    /// Read persisted status and metadata. Absent files leave the state empty.
    pub async fn load(&mut self) -> Result<(), DownloadError> {
        self.segments = read_status(&self.paths.status()).await?;
        self.metadata = match tokio::fs::read_to_string(self.paths.playlist()).await {
            Ok(text) => SessionMetadata::from_playlist(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        debug!(
            dir = %self.paths.dir().display(),
            segments = self.segments.len(),
            has_metadata = self.metadata.is_some(),
            "Loaded session state"
        );
        Ok(())
    }

    /// Fetch the playlist (and key) behind `stream_url`, reconcile it with the
    /// persisted state and write the local playlist, key and status files.
    pub async fn resolve(
        &mut self,
        stream_url: &str,
        force_refresh: bool,
    ) -> Result<ResolveOutcome, DownloadError> {
        let base = Url::parse(stream_url)
            .map_err(|e| DownloadError::invalid_url(stream_url, e.to_string()))?;

        let body = self
            .fetch
            .get_bytes(&base, ContentCheck::Application, "playlist")
            .await?;
        let playlist = VodPlaylist::parse(&body)?;

        let key = match playlist.key_uri() {
            Some(uri) => Some(self.fetch_key(&base, uri).await?),
            None => None,
        };

        let fresh = SessionMetadata {
            stream_url: stream_url.to_owned(),
            count: playlist.segment_count(),
            key,
        };

        let outcome = match (&self.metadata, force_refresh) {
            (_, true) => ResolveOutcome::Forced,
            (Some(previous), false) if fresh.allows_resume_of(previous) => ResolveOutcome::Resumed,
            (Some(_), false) => ResolveOutcome::Rebuilt,
            (None, false) => ResolveOutcome::Fresh,
        };

        let mut candidates = SegmentMap::new();
        for (index, uri) in playlist.segment_uris().enumerate() {
            let url = base
                .join(uri)
                .map_err(|e| DownloadError::invalid_url(uri, e.to_string()))?;
            let entry = match (outcome, self.segments.get(&index)) {
                (ResolveOutcome::Resumed, Some(previous)) => SegmentEntry {
                    url: url.into(),
                    done: previous.done,
                    attempt: previous.attempt,
                },
                _ => SegmentEntry::new(url),
            };
            candidates.insert(index, entry);
        }

        match outcome {
            ResolveOutcome::Rebuilt => info!(
                stream_url,
                segments = fresh.count,
                "Stream changed since the last run, restarting from scratch"
            ),
            ResolveOutcome::Resumed => info!(
                stream_url,
                done = candidates.values().filter(|e| e.done).count(),
                segments = fresh.count,
                "Resuming previous session"
            ),
            ResolveOutcome::Fresh | ResolveOutcome::Forced => debug!(
                stream_url,
                segments = fresh.count,
                ?outcome,
                "Starting new session"
            ),
        }

        match &fresh.key {
            Some(bytes) => tokio::fs::write(self.paths.key(), bytes).await?,
            None => remove_if_exists(&self.paths.key()).await?,
        }
        tokio::fs::write(self.paths.playlist(), playlist.rewrite_local(&fresh)?).await?;
        write_status(&self.paths.status(), &candidates).await?;

        self.segments = candidates;
        self.metadata = Some(fresh);
        Ok(outcome)
    }

    async fn fetch_key(&self, base: &Url, uri: &str) -> Result<Vec<u8>, DownloadError> {
        let key_url = base
            .join(uri)
            .map_err(|e| DownloadError::key_fetch(format!("invalid key URI `{uri}`: {e}")))?;
        let bytes = self
            .fetch
            .get_bytes(&key_url, ContentCheck::Application, "key")
            .await
            .map_err(|e| match e {
                DownloadError::Cancelled => e,
                other => DownloadError::key_fetch(format!("{key_url}: {other}")),
            })?;
        Ok(bytes.to_vec())
    }

    /// Indices that still need fetching: not done, or done without a regular file behind them.
    pub async fn pending_segments(&self) -> Vec<usize> {
        let mut pending = Vec::new();
        for (index, entry) in &self.segments {
            let complete = entry.done
                && tokio::fs::metadata(self.paths.segment(*index))
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
            if !complete {
                pending.push(*index);
            }
        }
        pending
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove stale file");
            Err(e.into())
        }
    }
}
