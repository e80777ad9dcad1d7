// Segment pool: fills in the missing segments of a resolved session with a bounded
// number of concurrent fetches and per-segment retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use rand::RngExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::client::HttpFetch;
use crate::hls::session::{PlaylistSession, SessionPaths};
use crate::hls::status::{SegmentMap, write_status};
use crate::{DownloadError, DownloaderConfig};

/// Bounded-concurrency segment fetcher.
pub struct SegmentPool {
    concurrency: usize,
    max_attempts: u32,
    token: CancellationToken,
}

impl SegmentPool {
    pub fn new(config: &DownloaderConfig) -> Self {
        Self {
            concurrency: config.segment_concurrency.max(1),
            max_attempts: config.max_segment_attempts,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Download every pending segment of `session`.
    ///
    /// `on_progress` receives the overall fraction of the episode that is on disk.
    /// Values stay below `1.0` while fetches are running; `1.0` is reported exactly
    /// once, after the last segment completed. Any segment that runs out of attempts
    /// makes the whole run fail with [`DownloadError::SegmentFailure`].
    pub async fn run(
        &self,
        session: &mut PlaylistSession,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), DownloadError> {
        let pending = session.pending_segments().await;
        let total = session.segments().len();
        let fetch = session.fetcher();
        let paths = session.paths().clone();

        if pending.is_empty() {
            debug!(dir = %paths.dir().display(), "No pending segments");
            on_progress(1.0);
            return Ok(());
        }

        info!(
            pending = pending.len(),
            total,
            workers = self.concurrency.min(pending.len()),
            "Downloading segments"
        );

        let state = RunState {
            fetch,
            paths,
            segments: tokio::sync::Mutex::new(std::mem::take(session.segments_mut())),
            pending: Mutex::new(pending.clone()),
            in_flight: Mutex::new(HashMap::new()),
            done: AtomicUsize::new(total - pending.len()),
            failed: AtomicUsize::new(0),
            total,
            max_attempts: self.max_attempts,
            on_progress,
        };

        let workers = (0..self.concurrency.min(pending.len()))
            .map(|id| state.worker(id, &self.token));
        let results = join_all(workers).await;

        let failed = state.failed.load(Ordering::Acquire);
        *session.segments_mut() = state.segments.into_inner();

        for result in results {
            result?;
        }

        if failed > 0 {
            warn!(failed, "Segments failed after exhausting retries");
            return Err(DownloadError::SegmentFailure { failed });
        }

        on_progress(1.0);
        Ok(())
    }
}

struct RunState<'a> {
    fetch: Arc<dyn HttpFetch>,
    paths: SessionPaths,
    segments: tokio::sync::Mutex<SegmentMap>,
    pending: Mutex<Vec<usize>>,
    in_flight: Mutex<HashMap<usize, f64>>,
    done: AtomicUsize,
    failed: AtomicUsize,
    total: usize,
    max_attempts: u32,
    on_progress: &'a (dyn Fn(f64) + Send + Sync),
}

impl RunState<'_> {
    fn take_random(&self) -> Option<usize> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return None;
        }
        let pick = rand::rng().random_range(0..pending.len());
        Some(pending.swap_remove(pick))
    }

    fn report(&self) {
        let partial: f64 = self.in_flight.lock().values().sum();
        let value = (self.done.load(Ordering::Acquire) as f64 + partial) / self.total as f64;
        if value < 1.0 {
            (self.on_progress)(value);
        }
    }

    async fn worker(&self, id: usize, token: &CancellationToken) -> Result<(), DownloadError> {
        while let Some(index) = self.take_random() {
            if token.is_cancelled() {
                self.pending.lock().push(index);
                return Err(DownloadError::Cancelled);
            }

            let url = {
                let segments = self.segments.lock().await;
                match segments.get(&index) {
                    Some(entry) => entry.url.clone(),
                    None => continue,
                }
            };

            trace!(worker = id, index, "Fetching segment");
            self.in_flight.lock().insert(index, 0.0);

            let result = tokio::select! {
                result = self.fetch_one(index, &url) => result,
                _ = token.cancelled() => {
                    self.in_flight.lock().remove(&index);
                    self.pending.lock().push(index);
                    return Err(DownloadError::Cancelled);
                }
            };
            self.in_flight.lock().remove(&index);

            let mut segments = self.segments.lock().await;
            let Some(entry) = segments.get_mut(&index) else {
                continue;
            };
            match result {
                Ok(bytes) => {
                    entry.done = true;
                    self.done.fetch_add(1, Ordering::AcqRel);
                    trace!(worker = id, index, bytes, "Segment done");
                }
                Err(e) => {
                    entry.attempt += 1;
                    if entry.attempt <= self.max_attempts {
                        debug!(index, attempt = entry.attempt, error = %e, "Segment failed, retrying");
                        self.pending.lock().push(index);
                    } else {
                        warn!(index, attempt = entry.attempt, error = %e, "Segment failed permanently");
                        self.failed.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
            write_status(&self.paths.status(), &segments).await?;
            drop(segments);

            self.report();
        }
        Ok(())
    }

    async fn fetch_one(&self, index: usize, url: &str) -> Result<u64, DownloadError> {
        let url = Url::parse(url).map_err(|e| DownloadError::invalid_url(url, e.to_string()))?;
        let dest = self.paths.segment(index);
        let progress = |fraction: f64| {
            if let Some(slot) = self.in_flight.lock().get_mut(&index) {
                *slot = (*slot + fraction).min(1.0);
            }
            self.report();
        };
        self.fetch.download_to_file(&url, &dest, &progress).await
    }
}
