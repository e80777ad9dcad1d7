//! Per-series LIFO queue of episode tasks with a single worker.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::episode::{EpisodeTask, ExtractionEngine};
use super::library::SeriesLibrary;
use super::status::{StatusEvent, StatusReporter};
use crate::Disposition;
use crate::Result;
use crate::catalog::{Catalog, clamp_intervals, episodes_in_intervals, parse_intervals};
use crate::downloader::VariantPreference;

#[derive(Default)]
struct Pending {
    stack: Vec<EpisodeTask>,
    queued: HashSet<u32>,
}

impl Pending {
    fn push(&mut self, task: EpisodeTask) -> bool {
        if !self.queued.insert(task.episode) {
            return false;
        }
        self.stack.push(task);
        true
    }

    fn pop(&mut self) -> Option<EpisodeTask> {
        let task = self.stack.pop()?;
        self.queued.remove(&task.episode);
        Some(task)
    }
}

/// Episodes waiting to be extracted for one series.
///
/// Tasks are taken most-recent-first. An episode number sits on the stack at
/// most once; it may be queued again as soon as the worker picked it up.
pub struct ExtractionQueue {
    engine: ExtractionEngine,
    catalog: Arc<dyn Catalog>,
    library: SeriesLibrary,
    reporter: StatusReporter,
    pending: Mutex<Pending>,
    wake: Notify,
    started: AtomicBool,
    token: CancellationToken,
}

impl ExtractionQueue {
    pub fn new(
        engine: ExtractionEngine,
        catalog: Arc<dyn Catalog>,
        library: SeriesLibrary,
        reporter: StatusReporter,
        token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            catalog,
            library,
            reporter,
            pending: Mutex::new(Pending::default()),
            wake: Notify::new(),
            started: AtomicBool::new(false),
            token,
        })
    }

    /// Spawn the worker. Only the first call spawns anything.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return None;
        }
        let queue = Arc::clone(self);
        Some(tokio::spawn(async move { queue.run().await }))
    }

    /// Number of tasks waiting on the stack.
    pub fn left(&self) -> usize {
        self.pending.lock().stack.len()
    }

    /// Push every episode not already waiting, then wake the worker.
    ///
    /// Returns the number of tasks waiting afterwards.
    pub fn queue(
        &self,
        episodes: impl IntoIterator<Item = u32>,
        preference: &VariantPreference,
    ) -> usize {
        let (added, left) = {
            let mut pending = self.pending.lock();
            let added = episodes
                .into_iter()
                .filter(|&episode| {
                    pending.push(EpisodeTask {
                        episode,
                        preference: preference.clone(),
                    })
                })
                .count();
            (added, pending.stack.len())
        };

        debug!(series = %self.reporter.series(), added, left, "Queued episodes");
        self.wake.notify_one();
        self.reporter.emit(StatusEvent::Left(left));
        left
    }

    /// Queue the catalog episodes that fall inside an interval expression.
    ///
    /// Nothing is queued, and no status is emitted, when no episode matches.
    pub async fn queue_intervals(
        &self,
        intervals: &str,
        preference: &VariantPreference,
    ) -> Result<usize> {
        let known = self.catalog.episode_numbers().await?;
        let (Some(&min), Some(&max)) = (known.iter().min(), known.iter().max()) else {
            return Ok(self.left());
        };

        let wanted = clamp_intervals(&parse_intervals(intervals), min, max);
        let episodes = episodes_in_intervals(&known, &wanted);
        if episodes.is_empty() {
            debug!(intervals, "No episode matches");
            return Ok(self.left());
        }
        Ok(self.queue(episodes, preference))
    }

    async fn run(self: Arc<Self>) {
        let series = self.reporter.series().to_owned();
        debug!(series = %series, "Extraction worker started");

        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = self.token.cancelled() => break,
            }

            while let Some(task) = self.next_task() {
                if self.process(task).await.is_break() {
                    info!(series = %series, "Extraction worker cancelled");
                    return;
                }
            }

            self.reporter.emit(StatusEvent::Current(None));
            self.reporter.emit(StatusEvent::Left(0));
        }

        info!(series = %series, "Extraction worker cancelled");
    }

    fn next_task(&self) -> Option<EpisodeTask> {
        if self.token.is_cancelled() {
            return None;
        }
        let (task, left) = {
            let mut pending = self.pending.lock();
            let task = pending.pop()?;
            (task, pending.stack.len())
        };
        self.reporter.emit(StatusEvent::Left(left));
        Some(task)
    }

    fn requeue(&self, task: EpisodeTask) {
        self.pending.lock().push(task);
    }

    async fn process(&self, task: EpisodeTask) -> ControlFlow<()> {
        let result = self
            .engine
            .extract(
                self.catalog.as_ref(),
                &self.library,
                &task,
                &self.reporter,
                &self.token,
            )
            .await;

        let flow = match result {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => match err.disposition() {
                Disposition::Requeue => {
                    self.reporter.emit(StatusEvent::Error(err.to_string()));
                    self.requeue(task);
                    ControlFlow::Continue(())
                }
                Disposition::Warn => {
                    self.reporter.emit(StatusEvent::Warning(err.to_string()));
                    ControlFlow::Continue(())
                }
                Disposition::Abort => {
                    warn!(episode = task.episode, "Extraction interrupted");
                    self.requeue(task);
                    ControlFlow::Break(())
                }
            },
        };

        self.reporter.emit(StatusEvent::End);
        flow
    }
}
