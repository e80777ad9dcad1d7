//! On-disk layout of a series inside the library root.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::{Error, Result};

/// Hidden folder holding per-episode working directories.
pub const DATA_DIR: &str = ".data";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_|\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s").unwrap());

/// Folder name for a series title.
///
/// Anything that is not an ASCII word character, whitespace or `|` becomes
/// `_`, then every whitespace character becomes `-`.
pub fn series_folder_name(title: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(title, "_");
    WHITESPACE.replace_all(&replaced, "-").into_owned()
}

#[derive(Debug, Clone)]
pub struct SeriesLibrary {
    series_dir: PathBuf,
}

impl SeriesLibrary {
    /// Create the series folder and its data folder under `root`.
    pub async fn open(root: &Path, title: &str) -> Result<Self> {
        match tokio::fs::metadata(root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(Error::config(format!(
                    "folder \"{}\" doesn't exist",
                    root.display()
                )));
            }
        }

        let series_dir = root.join(series_folder_name(title));
        tokio::fs::create_dir_all(series_dir.join(DATA_DIR)).await?;
        debug!(path = %series_dir.display(), "Series folder ready");

        Ok(Self { series_dir })
    }

    pub fn series_dir(&self) -> &Path {
        &self.series_dir
    }

    pub fn output_path(&self, label: &str) -> PathBuf {
        self.series_dir.join(format!("{label}.mp4"))
    }

    pub fn working_dir(&self, episode: u32) -> PathBuf {
        self.series_dir.join(DATA_DIR).join(episode.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names() {
        assert_eq!(series_folder_name("Show: The Movie!"), "Show_-The-Movie_");
        assert_eq!(series_folder_name("a|b  c"), "a|b--c");
        assert_eq!(series_folder_name("Tab\tname"), "Tab-name");
    }

    #[tokio::test]
    async fn open_creates_data_dir() {
        let root = tempfile::tempdir().unwrap();
        let library = SeriesLibrary::open(root.path(), "My Show").await.unwrap();

        assert_eq!(library.series_dir(), root.path().join("My-Show"));
        assert!(root.path().join("My-Show").join(DATA_DIR).is_dir());
        assert_eq!(
            library.output_path("1-2"),
            root.path().join("My-Show").join("1-2.mp4")
        );
        assert_eq!(
            library.working_dir(4),
            root.path().join("My-Show").join(DATA_DIR).join("4")
        );
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let err = SeriesLibrary::open(&missing, "x").await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
