//! Episode page → segmented-playlist URL resolution.

pub mod error;
pub mod js_engine;
pub mod strategy;

pub use error::ResolveError;
pub use js_engine::{JsError, JsSandbox, SandboxLimits};
pub use strategy::{
    PackedScriptResolver, ResolverKind, ResolverStrategy, StreamResolver, extract_packed_script,
    find_stream_url,
};
