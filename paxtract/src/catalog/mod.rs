//! Catalog seam: which episodes a series has and how to reach their variants.

pub mod details;
pub mod intervals;
pub mod manifest;

pub use details::{ExtractionDetails, describe_options};
pub use intervals::{clamp_intervals, episodes_in_intervals, parse_intervals};
pub use manifest::ManifestCatalog;

use async_trait::async_trait;

use crate::Result;
use crate::downloader::VariantOption;

/// A downloadable unit. One tape may carry several consecutive episodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    /// Opaque id used to fetch variant options.
    pub session: String,
    /// Episodes besides the root one that are part of this tape.
    pub bundled: Vec<u32>,
}

impl Tape {
    /// Output label: the root number, joined with the bundled ones by `-`.
    pub fn label(&self, root: u32) -> String {
        std::iter::once(root)
            .chain(self.bundled.iter().copied())
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    Tape(Tape),
    /// Episode bundled into the tape of the given root episode.
    Alias(u32),
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Series title, used to name the series folder.
    fn title(&self) -> &str;

    /// Every known episode number, ascending.
    async fn episode_numbers(&self) -> Result<Vec<u32>>;

    async fn lookup(&self, episode: u32) -> Result<Option<CatalogEntry>>;

    async fn fetch_variant_options(&self, session: &str) -> Result<Vec<VariantOption>>;

    /// Number of distinct tapes.
    async fn tapes_count(&self) -> Result<usize> {
        let mut count = 0;
        for episode in self.episode_numbers().await? {
            if matches!(self.lookup(episode).await?, Some(CatalogEntry::Tape(_))) {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Follow an alias to its root episode. Returns `(root, tape)`.
pub async fn resolve_tape(catalog: &dyn Catalog, episode: u32) -> Result<Option<(u32, Tape)>> {
    match catalog.lookup(episode).await? {
        None => Ok(None),
        Some(CatalogEntry::Tape(tape)) => Ok(Some((episode, tape))),
        Some(CatalogEntry::Alias(root)) => match catalog.lookup(root).await? {
            Some(CatalogEntry::Tape(tape)) => Ok(Some((root, tape))),
            _ => Ok(None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_labels() {
        let single = Tape {
            session: "s".into(),
            bundled: vec![],
        };
        assert_eq!(single.label(7), "7");

        let bundle = Tape {
            session: "s".into(),
            bundled: vec![8, 9],
        };
        assert_eq!(bundle.label(7), "7-8-9");
    }
}
