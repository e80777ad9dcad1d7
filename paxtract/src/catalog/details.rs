//! Human-facing summary of what a series can be extracted as.

use serde::{Deserialize, Serialize};

use super::{Catalog, resolve_tape};
use crate::downloader::VariantOption;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChoice {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityChoice {
    /// Value to request; `0` is "Lowest", `u32::MAX` is "Highest".
    pub quality: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionDetails {
    pub tapes_count: usize,
    pub first_episode: Option<u32>,
    pub last_episode: Option<u32>,
    pub audios: Vec<AudioChoice>,
    pub qualities: Vec<QualityChoice>,
}

fn audio_label(code: &str) -> String {
    match code {
        "jpn" => "Japanese".to_owned(),
        "eng" => "English".to_owned(),
        other => other.to_owned(),
    }
}

fn quality_tier(quality: u32) -> Option<&'static str> {
    match quality {
        0..300 => None,
        300..400 => Some("Low"),
        400..700 => Some("Standard"),
        700..1000 => Some("HD"),
        1000..1600 => Some("Full HD"),
        1600..3000 => Some("Ultra HD"),
        _ => None,
    }
}

/// Audio tracks in first-seen order and labelled quality tiers, ascending.
///
/// `Lowest`/`Highest` sentinels are added when the series has more than one
/// tape (qualities may differ between them) or no quality falls in a tier.
pub fn describe_options(
    options: &[VariantOption],
    tapes_count: usize,
) -> (Vec<AudioChoice>, Vec<QualityChoice>) {
    let mut audios: Vec<AudioChoice> = Vec::new();
    for option in options {
        if !audios.iter().any(|a| a.code == option.audio) {
            audios.push(AudioChoice {
                code: option.audio.clone(),
                label: audio_label(&option.audio),
            });
        }
    }

    let mut values: Vec<u32> = options.iter().map(|o| o.quality).collect();
    values.sort_unstable();
    values.dedup();

    let mut qualities: Vec<QualityChoice> = values
        .into_iter()
        .filter_map(|q| {
            quality_tier(q).map(|tier| QualityChoice {
                quality: q,
                label: format!("{tier} ({q}p)"),
            })
        })
        .collect();

    if tapes_count > 1 || qualities.is_empty() {
        qualities.insert(
            0,
            QualityChoice {
                quality: 0,
                label: "Lowest".to_owned(),
            },
        );
        qualities.push(QualityChoice {
            quality: u32::MAX,
            label: "Highest".to_owned(),
        });
    }

    (audios, qualities)
}

impl ExtractionDetails {
    /// Describe a series from the options of its last tape.
    pub async fn fetch(catalog: &dyn Catalog) -> Result<Self> {
        let episodes = catalog.episode_numbers().await?;
        let (first_episode, last_episode) = (episodes.first().copied(), episodes.last().copied());
        let tapes_count = catalog.tapes_count().await?;

        let options = match last_episode {
            Some(last) => {
                let (_, tape) = resolve_tape(catalog, last)
                    .await?
                    .ok_or_else(|| Error::catalog(format!("episode {last} has no tape")))?;
                catalog.fetch_variant_options(&tape.session).await?
            }
            None => Vec::new(),
        };

        let (audios, qualities) = describe_options(&options, tapes_count);
        Ok(Self {
            tapes_count,
            first_episode,
            last_episode,
            audios,
            qualities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(audio: &str, quality: u32) -> VariantOption {
        VariantOption {
            audio: audio.into(),
            quality,
            url: String::new(),
        }
    }

    #[test]
    fn labels_audio_and_quality_tiers() {
        let options = vec![
            option("jpn", 1080),
            option("jpn", 360),
            option("eng", 720),
            option("ger", 240),
            option("ger", 4320),
        ];
        let (audios, qualities) = describe_options(&options, 1);

        let labels: Vec<_> = audios.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Japanese", "English", "ger"]);

        let labels: Vec<_> = qualities.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["Low (360p)", "HD (720p)", "Full HD (1080p)"]);
    }

    #[test]
    fn sentinels_for_multiple_tapes() {
        let (_, qualities) = describe_options(&[option("jpn", 720)], 3);
        assert_eq!(qualities.first().unwrap().label, "Lowest");
        assert_eq!(qualities.first().unwrap().quality, 0);
        assert_eq!(qualities.last().unwrap().label, "Highest");
        assert_eq!(qualities.last().unwrap().quality, u32::MAX);
        assert_eq!(qualities.len(), 3);
    }

    #[test]
    fn sentinels_when_nothing_qualifies() {
        let (_, qualities) = describe_options(&[option("jpn", 144)], 1);
        assert_eq!(qualities.len(), 2);
    }
}
