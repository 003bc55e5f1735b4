//! # Marker Module
//!
//! Turns match ranges back into media: a video track that is black except
//! while a target is on screen, an audio track with a short tone at the
//! start and end of each range, or both muxed into one file.

pub mod artifacts;
pub mod audio;
pub mod compositor;
pub mod mux;
pub mod pipeline;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::matching::ScanResult;

pub use artifacts::{remove_if_exists, TempArtifacts};
pub use audio::{AudioMarkerScheduler, ToneSchedule};
pub use compositor::{letterbox, FrameCompositor};
pub use mux::mux_command;
pub use pipeline::{CancelToken, MarkerHandle, MarkerPipeline};

/// Which tracks the marker file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarkerMode {
    Video,
    Audio,
    Both,
}

impl MarkerMode {
    pub fn includes_video(self) -> bool {
        matches!(self, Self::Video | Self::Both)
    }

    pub fn includes_audio(self) -> bool {
        matches!(self, Self::Audio | Self::Both)
    }

    /// File extension of the marker file
    pub fn extension(self) -> &'static str {
        match self {
            Self::Audio => "wav",
            Self::Video | Self::Both => "mp4",
        }
    }

    /// `<stem>_markers.<ext>` next to the source video
    pub fn default_output(self, source_video: &Path) -> PathBuf {
        let stem = source_video
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        source_video.with_file_name(format!("{}_markers.{}", stem, self.extension()))
    }
}

/// One range to mark, with the image to show while it lasts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedRange {
    pub start_frame: u64,
    pub end_frame: u64,
    pub target_path: PathBuf,
}

impl MarkedRange {
    pub fn new<P: Into<PathBuf>>(start_frame: u64, end_frame: u64, target_path: P) -> Self {
        Self {
            start_frame,
            end_frame,
            target_path: target_path.into(),
        }
    }
}

/// Everything needed to generate one marker file
#[derive(Debug, Clone)]
pub struct MarkerRequest {
    pub source_video: PathBuf,
    pub ranges: Vec<MarkedRange>,
    pub output: PathBuf,
    pub mode: MarkerMode,
}

impl MarkerRequest {
    /// Collect every range found in `source_video` across all targets
    ///
    /// Targets are taken in alias order, so where ranges of different
    /// targets overlap the alphabetically later alias is shown.
    pub fn from_scan<P, Q>(
        result: &ScanResult,
        source_video: P,
        output: Q,
        mode: MarkerMode,
    ) -> Self
    where
        P: AsRef<Path>,
        Q: Into<PathBuf>,
    {
        let source_video = source_video.as_ref();
        let ranges = result
            .ranges_for_video(source_video)
            .map(|found| {
                MarkedRange::new(found.range.start_frame, found.range.end_frame, &found.target_path)
            })
            .collect();

        Self {
            source_video: source_video.to_path_buf(),
            ranges,
            output: output.into(),
            mode,
        }
    }
}

/// Terminal state of a marker run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerOutcome {
    Completed(PathBuf),
    Cancelled,
    Failed(String),
}

impl MarkerOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Result of a single pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Cancelled,
}
