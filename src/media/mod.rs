//! # Media Engine Module
//!
//! Interface to the external encode/mix/mux engine and its FFmpeg
//! implementation. Everything that spawns `ffmpeg` for output goes through
//! [`MediaEngine`] so tests can substitute a recording stub.

pub mod engine;
pub mod ffmpeg;

pub use engine::{FrameWriter, MediaCommand, MediaEngine, MediaOutput};
pub use ffmpeg::FfmpegEngine;
