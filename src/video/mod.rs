//! # Video Module
//!
//! Frame types and the decoding interface used by the scanner and the
//! marker pipeline.

pub mod decoder;
pub mod types;

pub use decoder::{FfmpegDecoder, VideoDecoder, VideoSource};
pub use types::{DecodedFrame, Frame, VideoProperties};
