//! Capability-restricted JavaScript evaluation.
//!
//! Episode pages hide their stream address behind a packed script; this module
//! runs such scripts on QuickJS with memory, stack and time ceilings.
//!
//! ```ignore
//! use stream_resolver::js_engine::JsSandbox;
//!
//! let unpacked = JsSandbox::default().eval_string("(function(p){return p})('hi')")?;
//! ```

mod context;
mod error;
mod manager;

pub use context::JsContext;
pub use error::JsError;
pub use manager::{JsSandbox, SandboxLimits};
