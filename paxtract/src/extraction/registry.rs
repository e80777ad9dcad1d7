//! Lazily created extraction queues, one per series.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::episode::ExtractionEngine;
use super::library::SeriesLibrary;
use super::queue::ExtractionQueue;
use super::status::StatusReporter;
use crate::Result;
use crate::catalog::Catalog;
use crate::downloader::VariantPreference;

/// Owns every series queue. Queues live as long as the registry.
pub struct QueueRegistry {
    library_root: PathBuf,
    engine: ExtractionEngine,
    token: CancellationToken,
    queues: tokio::sync::Mutex<HashMap<String, Arc<ExtractionQueue>>>,
}

impl QueueRegistry {
    pub fn new(library_root: impl Into<PathBuf>, engine: ExtractionEngine) -> Self {
        Self {
            library_root: library_root.into(),
            engine,
            token: CancellationToken::new(),
            queues: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Token cancelling every queue created by this registry.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Queue for `series_id`, created and started on first use.
    ///
    /// `catalog` and `reporter` are only used when the queue is created.
    pub async fn get_or_create(
        &self,
        series_id: &str,
        catalog: Arc<dyn Catalog>,
        reporter: StatusReporter,
    ) -> Result<Arc<ExtractionQueue>> {
        let mut queues = self.queues.lock().await;
        if let Some(queue) = queues.get(series_id) {
            return Ok(Arc::clone(queue));
        }

        let library = SeriesLibrary::open(&self.library_root, catalog.title()).await?;
        let queue = ExtractionQueue::new(
            self.engine.clone(),
            catalog,
            library,
            reporter,
            self.token.child_token(),
        );
        queue.start();
        info!(series = series_id, "Created extraction queue");

        queues.insert(series_id.to_owned(), Arc::clone(&queue));
        Ok(queue)
    }

    /// Queue the episodes of `series_id` matching `intervals`.
    pub async fn enqueue(
        &self,
        series_id: &str,
        catalog: Arc<dyn Catalog>,
        intervals: &str,
        preference: &VariantPreference,
        reporter: StatusReporter,
    ) -> Result<usize> {
        let queue = self.get_or_create(series_id, catalog, reporter).await?;
        queue.queue_intervals(intervals, preference).await
    }

    pub async fn len(&self) -> usize {
        self.queues.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queues.lock().await.is_empty()
    }

    /// Stop every worker. Tasks in progress are put back on their stacks.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}
