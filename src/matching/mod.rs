//! # Matching Module
//!
//! The pixel-difference comparator, the run-length grouping of matched
//! frames, and the data types describing targets and match ranges.

pub mod comparator;
pub mod grouper;
pub mod types;

pub use comparator::{compare, mean_difference, Comparator};
pub use grouper::group_matches;
pub use types::{FrameRange, MatchEvent, MatchRange, ScanResult, Target, TargetSpec};

/// Default maximum mean normalized difference for two images to match
pub const DEFAULT_THRESHOLD: f64 = 0.05;
