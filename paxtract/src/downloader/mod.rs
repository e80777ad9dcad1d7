//! Variant selection and remuxing.

pub mod engine;
pub mod stream_selector;

pub use engine::{FfmpegConfig, FfmpegMuxer, Muxer};
pub use stream_selector::{DEFAULT_AUDIO, VariantOption, VariantPreference, VariantSelector};
