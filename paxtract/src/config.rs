//! Application configuration: JSON file, then environment, then CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stream_resolver::{ResolverKind, SandboxLimits};
use tracing::debug;
use vod_engine::DownloaderConfig;
use vod_engine::config::{
    DEFAULT_MAX_SEGMENT_ATTEMPTS, DEFAULT_REFERER, DEFAULT_SEGMENT_CONCURRENCY, DEFAULT_USER_AGENT,
};

use crate::downloader::{FfmpegConfig, VariantPreference};
use crate::{Error, Result};

pub const ENV_LIBRARY: &str = "PAXTRACT_LIBRARY";
pub const ENV_FFMPEG: &str = "PAXTRACT_FFMPEG";
pub const ENV_REFERER: &str = "PAXTRACT_REFERER";
pub const ENV_LOG: &str = "PAXTRACT_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder holding one sub-folder per series.
    pub library_dir: PathBuf,
    pub ffmpeg: FfmpegConfig,
    pub referer: String,
    pub user_agent: String,
    /// Filter directive; `RUST_LOG` and the built-in default apply when unset.
    pub log_filter: Option<String>,
    /// Enables daily log files in this folder.
    pub log_dir: Option<PathBuf>,
    /// Per-request timeout in seconds, `0` for none.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub segment_concurrency: usize,
    pub max_segment_attempts: u32,
    pub resolver: ResolverKind,
    pub sandbox: SandboxLimits,
    pub preference: VariantPreference,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("."),
            ffmpeg: FfmpegConfig::default(),
            referer: DEFAULT_REFERER.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            log_filter: None,
            log_dir: None,
            timeout_secs: 0,
            connect_timeout_secs: 0,
            segment_concurrency: DEFAULT_SEGMENT_CONCURRENCY,
            max_segment_attempts: DEFAULT_MAX_SEGMENT_ATTEMPTS,
            resolver: ResolverKind::default(),
            sandbox: SandboxLimits::default(),
            preference: VariantPreference::default(),
        }
    }
}

impl AppConfig {
    /// Read `path` when given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(format!("failed to read {}: {e}", path.display()))
                })?;
                serde_json::from_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Apply `PAXTRACT_*` overrides looked up through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup(ENV_LIBRARY) {
            self.library_dir = PathBuf::from(dir);
        }
        if let Some(binary) = lookup(ENV_FFMPEG) {
            self.ffmpeg.binary_path = binary;
        }
        if let Some(referer) = lookup(ENV_REFERER) {
            self.referer = referer;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = Some(filter);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_concurrency == 0 {
            return Err(Error::validation("segment_concurrency must be at least 1"));
        }
        if self.ffmpeg.binary_path.trim().is_empty() {
            return Err(Error::validation("ffmpeg binary path is empty"));
        }
        Ok(())
    }

    pub fn downloader_config(&self) -> DownloaderConfig {
        DownloaderConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            segment_concurrency: self.segment_concurrency,
            max_segment_attempts: self.max_segment_attempts,
            pool_max_idle_per_host: self.segment_concurrency,
            ..DownloaderConfig::default()
        }
        .with_referer(self.referer.clone())
        .with_user_agent(self.user_agent.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"library_dir": "/media/shows", "timeout_secs": 30}"#)
                .unwrap();
        assert_eq!(config.library_dir, PathBuf::from("/media/shows"));
        assert_eq!(config.segment_concurrency, 7);
        assert_eq!(config.resolver, ResolverKind::PackedScript);

        let engine = config.downloader_config();
        assert_eq!(engine.timeout, Duration::from_secs(30));
        assert!(engine.connect_timeout.is_zero());
        assert_eq!(engine.referer, DEFAULT_REFERER);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_LIBRARY, "/srv/library"),
            (ENV_FFMPEG, "/opt/ffmpeg/bin/ffmpeg"),
            (ENV_LOG, "paxtract=debug"),
            (ENV_REFERER, "  "),
        ]);

        let mut config = AppConfig::default();
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.library_dir, PathBuf::from("/srv/library"));
        assert_eq!(config.ffmpeg.binary_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.log_filter.as_deref(), Some("paxtract=debug"));
        assert_eq!(config.referer, DEFAULT_REFERER);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = AppConfig {
            segment_concurrency: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paxtract.json");
        std::fs::write(&path, r#"{"resolver": "direct", "preference": {"audio": "eng"}}"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.resolver, ResolverKind::Direct);
        assert_eq!(config.preference.audio, "eng");
        assert_eq!(config.preference.quality, 1080);
    }
}
