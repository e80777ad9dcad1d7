//! Episode extraction for segmented VOD streams.
//!
//! A [`extraction::QueueRegistry`] keeps one [`extraction::ExtractionQueue`] per
//! series. Each queue resolves its episodes through a [`catalog::Catalog`],
//! downloads their segments with `vod-engine` and remuxes them into the series
//! folder of the library.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod extraction;
pub mod logging;

pub use error::{Disposition, EpisodeError, Error, Result};
