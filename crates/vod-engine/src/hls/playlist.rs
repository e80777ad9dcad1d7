use m3u8_rs::{KeyMethod, MediaPlaylist, Playlist, parse_playlist_res};
use tracing::debug;

use crate::DownloadError;
use crate::hls::status::SessionMetadata;

/// Local file name the key is stored under, relative to the rewritten playlist.
pub const LOCAL_KEY_NAME: &str = "key";

/// A parsed media playlist of a finished (VOD) stream.
#[derive(Debug, Clone)]
pub struct VodPlaylist {
    playlist: MediaPlaylist,
}

impl VodPlaylist {
    pub fn parse(bytes: &[u8]) -> Result<Self, DownloadError> {
        let playlist = match parse_playlist_res(bytes) {
            Ok(Playlist::MediaPlaylist(pl)) => pl,
            Ok(Playlist::MasterPlaylist(_)) => {
                return Err(DownloadError::playlist(
                    "expected a media playlist, got a master playlist",
                ));
            }
            Err(e) => {
                return Err(DownloadError::playlist(format!("failed to parse playlist: {e:?}")));
            }
        };

        if playlist.segments.is_empty() {
            return Err(DownloadError::playlist("playlist contains no segments"));
        }

        debug!(segments = playlist.segments.len(), "Parsed media playlist");
        Ok(Self { playlist })
    }

    pub fn segment_count(&self) -> usize {
        self.playlist.segments.len()
    }

    /// Segment URIs in playlist order, as written in the playlist.
    pub fn segment_uris(&self) -> impl Iterator<Item = &str> {
        self.playlist.segments.iter().map(|s| s.uri.as_str())
    }

    /// URI of the stream's encryption key, if any segment is encrypted.
    pub fn key_uri(&self) -> Option<&str> {
        self.playlist
            .segments
            .iter()
            .filter_map(|s| s.key.as_ref())
            .filter(|k| k.method != KeyMethod::None)
            .find_map(|k| k.uri.as_deref())
    }

    /// Render the playlist for local playback: the key URI points at [`LOCAL_KEY_NAME`],
    /// each segment at its index, and the metadata directive is appended last.
    pub fn rewrite_local(&self, metadata: &SessionMetadata) -> Result<String, DownloadError> {
        let mut local = self.playlist.clone();
        for (index, segment) in local.segments.iter_mut().enumerate() {
            segment.uri = index.to_string();
            if let Some(key) = segment.key.as_mut()
                && key.uri.is_some()
            {
                key.uri = Some(LOCAL_KEY_NAME.to_owned());
            }
        }

        let mut out = Vec::new();
        local.write_to(&mut out)?;
        let mut text = String::from_utf8(out)
            .map_err(|e| DownloadError::playlist(format!("rewritten playlist is not UTF-8: {e}")))?;

        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&metadata.to_directive()?);
        text.push('\n');
        Ok(text)
    }
}
