//! JSON manifest catalog used by the command line.
//!
//! ```json
//! {
//!   "title": "Some Show",
//!   "episodes": [
//!     { "episode": 1, "session": "a1" },
//!     { "episode": 2, "session": "b2", "bundled": [3] }
//!   ],
//!   "options": {
//!     "a1": [{ "audio": "jpn", "quality": 720, "url": "https://kwik.example/e/x" }]
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Catalog, CatalogEntry, Tape};
use crate::downloader::VariantOption;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEpisode {
    pub episode: u32,
    pub session: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bundled: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub title: String,
    pub episodes: Vec<ManifestEpisode>,
    #[serde(default)]
    pub options: HashMap<String, Vec<VariantOption>>,
}

/// In-memory catalog built from a [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    title: String,
    entries: BTreeMap<u32, CatalogEntry>,
    options: HashMap<String, Vec<VariantOption>>,
}

impl ManifestCatalog {
    pub fn from_manifest(manifest: Manifest) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for ep in manifest.episodes {
            for bundled in &ep.bundled {
                if *bundled == ep.episode {
                    return Err(Error::catalog(format!(
                        "episode {} bundles itself",
                        ep.episode
                    )));
                }
                entries.insert(*bundled, CatalogEntry::Alias(ep.episode));
            }
            entries.insert(
                ep.episode,
                CatalogEntry::Tape(Tape {
                    session: ep.session,
                    bundled: ep.bundled,
                }),
            );
        }

        Ok(Self {
            title: manifest.title,
            entries,
            options: manifest.options,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_manifest(serde_json::from_str(text)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::catalog(format!("failed to read manifest {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            episodes = catalog.entries.len(),
            "Loaded manifest catalog"
        );
        Ok(catalog)
    }
}

#[async_trait]
impl Catalog for ManifestCatalog {
    fn title(&self) -> &str {
        &self.title
    }

    async fn episode_numbers(&self) -> Result<Vec<u32>> {
        Ok(self.entries.keys().copied().collect())
    }

    async fn lookup(&self, episode: u32) -> Result<Option<CatalogEntry>> {
        Ok(self.entries.get(&episode).cloned())
    }

    async fn fetch_variant_options(&self, session: &str) -> Result<Vec<VariantOption>> {
        Ok(self.options.get(session).cloned().unwrap_or_default())
    }

    async fn tapes_count(&self) -> Result<usize> {
        Ok(self
            .entries
            .values()
            .filter(|e| matches!(e, CatalogEntry::Tape(_)))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::resolve_tape;

    const MANIFEST: &str = r#"{
        "title": "Show: The Movie!",
        "episodes": [
            { "episode": 1, "session": "a1" },
            { "episode": 2, "session": "b2", "bundled": [3] }
        ],
        "options": {
            "b2": [{ "audio": "jpn", "quality": 720, "url": "https://kwik.example/e/b2" }]
        }
    }"#;

    #[tokio::test]
    async fn aliases_resolve_to_root_tape() {
        let catalog = ManifestCatalog::from_json(MANIFEST).unwrap();
        assert_eq!(catalog.episode_numbers().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(catalog.tapes_count().await.unwrap(), 2);
        assert_eq!(catalog.lookup(3).await.unwrap(), Some(CatalogEntry::Alias(2)));

        let (root, tape) = resolve_tape(&catalog, 3).await.unwrap().unwrap();
        assert_eq!(root, 2);
        assert_eq!(tape.label(root), "2-3");
        assert_eq!(catalog.fetch_variant_options(&tape.session).await.unwrap().len(), 1);

        assert!(resolve_tape(&catalog, 9).await.unwrap().is_none());
    }

    #[test]
    fn self_bundling_is_rejected() {
        let manifest = r#"{"title":"x","episodes":[{"episode":1,"session":"s","bundled":[1]}]}"#;
        assert!(matches!(
            ManifestCatalog::from_json(manifest),
            Err(Error::Catalog(_))
        ));
    }
}
