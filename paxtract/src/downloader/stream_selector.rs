//! Variant selection: pick one direct media URL per episode from the audio and
//! quality combinations the catalog offers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Audio track used when the requested one is not offered.
pub const DEFAULT_AUDIO: &str = "jpn";

/// One audio/quality combination of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub audio: String,
    /// Vertical resolution, e.g. `720`.
    pub quality: u32,
    /// Page reference handed to the stream resolver.
    pub url: String,
}

/// Requested audio track and quality.
///
/// `quality` is compared numerically; `0` asks for the lowest and `u32::MAX`
/// for the highest available quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantPreference {
    pub audio: String,
    pub quality: u32,
}

impl Default for VariantPreference {
    fn default() -> Self {
        Self {
            audio: DEFAULT_AUDIO.to_owned(),
            quality: 1080,
        }
    }
}

impl VariantPreference {
    pub fn new(audio: impl Into<String>, quality: u32) -> Self {
        Self {
            audio: audio.into(),
            quality,
        }
    }
}

/// Chooses the variant closest to a [`VariantPreference`].
#[derive(Debug, Default, Clone, Copy)]
pub struct VariantSelector;

impl VariantSelector {
    pub fn new() -> Self {
        Self
    }

    /// Select a variant.
    ///
    /// Audio falls back from the requested track to [`DEFAULT_AUDIO`] to the first
    /// track listed. Within the track, the smallest quality at or above the request
    /// wins, otherwise the largest one.
    pub fn select<'a>(
        &self,
        options: &'a [VariantOption],
        preference: &VariantPreference,
    ) -> Result<(&'a str, &'a VariantOption)> {
        let first = options.first().ok_or(Error::NoVariants)?;

        let track = [preference.audio.as_str(), DEFAULT_AUDIO]
            .into_iter()
            .find(|audio| options.iter().any(|o| o.audio == *audio))
            .unwrap_or(first.audio.as_str());

        // first-seen option per quality within the track
        let mut branch: Vec<&VariantOption> = Vec::new();
        for option in options.iter().filter(|o| o.audio == track) {
            if !branch.iter().any(|b| b.quality == option.quality) {
                branch.push(option);
            }
        }

        let chosen = branch
            .iter()
            .filter(|o| o.quality >= preference.quality)
            .min_by_key(|o| o.quality)
            .or_else(|| branch.iter().max_by_key(|o| o.quality))
            .copied()
            .ok_or(Error::NoVariants)?;

        debug!(
            requested_audio = %preference.audio,
            requested_quality = preference.quality,
            audio = %chosen.audio,
            quality = chosen.quality,
            "Selected variant"
        );
        Ok((chosen.url.as_str(), chosen))
    }
}
