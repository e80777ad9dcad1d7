//! Resumable download of a finished (VOD) HLS stream into a working directory.
//!
//! [`PlaylistSession`] turns a stream URL into a local playlist plus a persisted
//! segment map, and [`SegmentPool`] fills the map in.

pub mod playlist;
pub mod pool;
pub mod session;
pub mod status;

pub use playlist::{LOCAL_KEY_NAME, VodPlaylist};
pub use pool::SegmentPool;
pub use session::{PlaylistSession, ResolveOutcome, SessionPaths, prepare_working_dir};
pub use status::{SegmentEntry, SegmentMap, SessionMetadata};
