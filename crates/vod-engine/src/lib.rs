pub mod client;
pub mod config;
pub mod error;
pub mod hls;

pub use client::{ContentCheck, HttpClient, HttpFetch, create_client};
pub use config::DownloaderConfig;
pub use error::DownloadError;
