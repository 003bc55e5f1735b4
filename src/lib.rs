//! # Frame-Scout
//!
//! Find where target images appear in videos, and turn the hits into
//! marker media.
//!
//! The library scans videos frame by frame, compares every frame against a
//! set of target images, collapses consecutive matches into time ranges
//! and can render those ranges back into a marker file: a video that
//! flashes the target while it is on screen, an audio track with a short
//! tone at the start and end of each range, or both.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frame_scout::{
//!     config::Config,
//!     events::NullObserver,
//!     matching::TargetSpec,
//!     scan::{ScanEngine, ScanJob},
//!     video::FfmpegDecoder,
//! };
//!
//! # fn main() -> frame_scout::Result<()> {
//! let config = Config::default();
//! let mut engine = ScanEngine::new(Arc::new(FfmpegDecoder::default()), &config.scan)?;
//!
//! let job = ScanJob::new(
//!     vec!["episode.mp4".into()],
//!     vec![TargetSpec::parse("logo=logo.png")],
//! );
//! let result = engine.run(&job, &NullObserver);
//!
//! for (alias, ranges) in result.iter() {
//!     println!("{}: {} ranges", alias, ranges.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`matching`] - Pixel-difference comparator and range grouping
//! - [`scan`] - Scan engine with pause, resume and stop
//! - [`marker`] - Marker video/audio generation and muxing
//! - [`video`] - Video decoding through ffprobe/ffmpeg
//! - [`media`] - External encode/mix/mux engine
//! - [`events`] - Observer interface for progress and log lines
//! - [`export`] - CSV and JSON output of scan results
//! - [`config`] - Configuration management

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod marker;
pub mod matching;
pub mod media;
pub mod scan;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{Result, ScoutError},
    events::{Event, LogLevel, Observer},
    marker::{MarkerMode, MarkerOutcome, MarkerPipeline, MarkerRequest},
    matching::{MatchRange, ScanResult, TargetSpec},
    scan::{ScanEngine, ScanHandle, ScanJob},
};
