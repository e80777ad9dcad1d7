//! Per-series extraction: queue, episode pipeline and status reporting.

pub mod episode;
pub mod library;
pub mod queue;
pub mod registry;
pub mod status;

pub use episode::{EpisodeTask, ExtractionEngine};
pub use library::{SeriesLibrary, series_folder_name};
pub use queue::ExtractionQueue;
pub use registry::QueueRegistry;
pub use status::{StatusEvent, StatusReceiver, StatusReporter};
