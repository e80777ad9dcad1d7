//! Persisted bookkeeping of a playlist session.
//!
//! Two artifacts live in an episode working directory:
//! - `status`: zlib-compressed JSON map `{ "<index>": { "url", "done"?, "attempt"? } }`
//! - a metadata directive appended to the rewritten playlist, carrying
//!   base64(zlib(JSON `{ "streamURL", "count", "key"? }`)).

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::DownloadError;

/// Playlist directive carrying the serialized [`SessionMetadata`].
pub const METADATA_DIRECTIVE: &str = "#EXT-X-METADATA:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempt: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl SegmentEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            done: false,
            attempt: 0,
        }
    }
}

/// Segment index → status. The index doubles as the local file name.
pub type SegmentMap = BTreeMap<usize, SegmentEntry>;

/// Identity of the remote stream a working directory was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(rename = "streamURL")]
    pub stream_url: String,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "key_base64")]
    pub key: Option<Vec<u8>>,
}

impl SessionMetadata {
    /// Prior progress may be reused only for the very same stream, segment count and key.
    pub fn allows_resume_of(&self, previous: &SessionMetadata) -> bool {
        self.stream_url == previous.stream_url
            && self.count == previous.count
            && self.key == previous.key
    }

    pub fn to_directive(&self) -> Result<String, DownloadError> {
        let packed = pack_json(self)?;
        Ok(format!("{METADATA_DIRECTIVE}{}", STANDARD.encode(packed)))
    }

    /// Find and decode the metadata directive in a rewritten playlist.
    ///
    /// Returns `None` when the directive is missing or cannot be decoded.
    pub fn from_playlist(text: &str) -> Option<Self> {
        let encoded = text
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix(METADATA_DIRECTIVE))?;

        let decoded = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Metadata directive is not valid base64");
                return None;
            }
        };

        match unpack_json(&decoded) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(error = %e, "Metadata directive could not be decoded");
                None
            }
        }
    }
}

mod key_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match key {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

pub fn pack_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, DownloadError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| DownloadError::session_state(format!("serialize: {e}")))?;
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

pub fn unpack_json<T: DeserializeOwned>(packed: &[u8]) -> Result<T, DownloadError> {
    let mut json = Vec::new();
    ZlibDecoder::new(packed)
        .read_to_end(&mut json)
        .map_err(|e| DownloadError::session_state(format!("inflate: {e}")))?;
    serde_json::from_slice(&json).map_err(|e| DownloadError::session_state(format!("deserialize: {e}")))
}

/// Read the status map at `path`.
///
/// A missing file yields an empty map. An unreadable one is logged and also
/// treated as empty, which makes the next resolve rebuild it.
pub async fn read_status(path: &Path) -> Result<SegmentMap, DownloadError> {
    let packed = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SegmentMap::new()),
        Err(e) => return Err(e.into()),
    };

    match unpack_json(&packed) {
        Ok(map) => Ok(map),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Discarding corrupt status file");
            Ok(SegmentMap::new())
        }
    }
}

/// Replace the status file at `path` with `map`.
///
/// The new content is written next to the target and renamed over it, so a
/// crash never leaves a half-written status behind.
pub async fn write_status(path: &Path, map: &SegmentMap) -> Result<(), DownloadError> {
    let packed = pack_json(map)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, packed).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_json_uses_compact_entries() {
        let mut map = SegmentMap::new();
        map.insert(0, SegmentEntry::new("https://cdn/seg0.ts"));
        map.insert(
            1,
            SegmentEntry {
                url: "https://cdn/seg1.ts".into(),
                done: true,
                attempt: 2,
            },
        );

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"{"0":{"url":"https://cdn/seg0.ts"},"1":{"url":"https://cdn/seg1.ts","done":true,"attempt":2}}"#
        );
    }

    #[test]
    fn metadata_survives_playlist_embedding() {
        let metadata = SessionMetadata {
            stream_url: "https://cdn/stream/uwu.m3u8".into(),
            count: 12,
            key: Some(vec![0x10; 16]),
        };
        let playlist = format!("#EXTM3U\n#EXTINF:4,\n0\n#EXT-X-ENDLIST\n{}\n", metadata.to_directive().unwrap());

        assert_eq!(SessionMetadata::from_playlist(&playlist), Some(metadata));
    }

    #[test]
    fn garbage_directive_is_ignored() {
        let playlist = "#EXTM3U\n#EXT-X-METADATA:not-base64!!\n";
        assert_eq!(SessionMetadata::from_playlist(playlist), None);
        assert_eq!(SessionMetadata::from_playlist("#EXTM3U\n"), None);
    }

    #[test]
    fn resume_requires_identical_key() {
        let previous = SessionMetadata {
            stream_url: "https://cdn/a.m3u8".into(),
            count: 3,
            key: None,
        };
        let mut fresh = previous.clone();
        assert!(fresh.allows_resume_of(&previous));

        fresh.key = Some(vec![1, 2, 3]);
        assert!(!fresh.allows_resume_of(&previous));

        fresh.key = None;
        fresh.count = 4;
        assert!(!fresh.allows_resume_of(&previous));
    }

    #[tokio::test]
    async fn missing_and_corrupt_status_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        assert!(read_status(&path).await.unwrap().is_empty());

        tokio::fs::write(&path, b"definitely not zlib").await.unwrap();
        assert!(read_status(&path).await.unwrap().is_empty());

        let mut map = SegmentMap::new();
        map.insert(4, SegmentEntry::new("https://cdn/4.ts"));
        write_status(&path, &map).await.unwrap();
        assert_eq!(read_status(&path).await.unwrap(), map);
    }
}
