use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// A target image as requested by the caller: path plus optional alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub path: PathBuf,
    pub alias: Option<String>,
}

impl TargetSpec {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }

    pub fn with_alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Alias shown in logs and results; defaults to the file name
    pub fn display_alias(&self) -> String {
        self.alias.clone().unwrap_or_else(|| file_label(&self.path))
    }

    /// Parse `ALIAS=PATH` or a bare `PATH`
    pub fn parse(value: &str) -> Self {
        match value.split_once('=') {
            Some((alias, path)) if !alias.is_empty() && !path.is_empty() => {
                Self::new(path).with_alias(alias)
            }
            _ => Self::new(value),
        }
    }
}

/// A decoded target image
#[derive(Debug, Clone)]
pub struct Target {
    pub path: PathBuf,
    pub alias: String,
    pub image: RgbImage,
}

impl Target {
    /// Decode the image a `TargetSpec` points at
    pub fn load(spec: &TargetSpec) -> Result<Self> {
        let image = image::open(&spec.path).map_err(|e| TargetError::LoadFailed {
            path: spec.path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            path: spec.path.clone(),
            alias: spec.display_alias(),
            image: image.to_rgb8(),
        })
    }
}

/// One frame that matched a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchEvent {
    pub frame_index: u64,
    pub timestamp: f64,
}

impl MatchEvent {
    pub fn new(frame_index: u64, timestamp: f64) -> Self {
        Self {
            frame_index,
            timestamp,
        }
    }
}

/// Contiguous span of matching frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: f64,
    pub end_time: f64,
}

impl FrameRange {
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }
}

/// A frame range tagged with the video and target it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRange {
    #[serde(flatten)]
    pub range: FrameRange,

    /// File name of the source video
    pub video: String,

    pub video_path: PathBuf,

    pub target_path: PathBuf,
}

/// Ranges found per target alias
///
/// Ranges for an alias are kept in discovery order: videos in the order
/// they were scanned, then by frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanResult {
    targets: BTreeMap<String, Vec<MatchRange>>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure an alias is present even if it never matches
    pub fn register(&mut self, alias: &str) {
        self.targets.entry(alias.to_string()).or_default();
    }

    pub fn extend<I: IntoIterator<Item = MatchRange>>(&mut self, alias: &str, ranges: I) {
        self.targets.entry(alias.to_string()).or_default().extend(ranges);
    }

    pub fn ranges(&self, alias: &str) -> Option<&[MatchRange]> {
        self.targets.get(alias).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MatchRange])> {
        self.targets.iter().map(|(alias, ranges)| (alias.as_str(), ranges.as_slice()))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of ranges across all targets
    pub fn total_ranges(&self) -> usize {
        self.targets.values().map(Vec::len).sum()
    }

    /// All ranges found in one video, target by target
    ///
    /// `./clip.mp4` and `clip.mp4` name the same video, as do two paths
    /// that resolve to the same file.
    pub fn ranges_for_video<'a>(
        &'a self,
        video_path: &'a Path,
    ) -> impl Iterator<Item = &'a MatchRange> + 'a {
        self.targets
            .values()
            .flatten()
            .filter(move |range| same_video(&range.video_path, video_path))
    }

    /// Video of the first range, in alias order
    pub fn first_video(&self) -> Option<&Path> {
        self.targets
            .values()
            .find_map(|ranges| ranges.first())
            .map(|found| found.video_path.as_path())
    }
}

fn same_video(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    let lexical = |path: &Path| -> PathBuf {
        path.components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect()
    };
    if lexical(a) == lexical(b) {
        return true;
    }

    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// File name of a path for display purposes
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_range(video: &str, start: u64, end: u64) -> MatchRange {
        MatchRange {
            range: FrameRange {
                start_frame: start,
                end_frame: end,
                start_time: start as f64 / 10.0,
                end_time: end as f64 / 10.0,
            },
            video: video.to_string(),
            video_path: PathBuf::from(format!("/videos/{}", video)),
            target_path: PathBuf::from("/targets/logo.png"),
        }
    }

    #[test]
    fn test_target_spec_parsing() {
        let bare = TargetSpec::parse("/images/logo.png");
        assert_eq!(bare.path, PathBuf::from("/images/logo.png"));
        assert_eq!(bare.display_alias(), "logo.png");

        let aliased = TargetSpec::parse("intro=/images/title card.png");
        assert_eq!(aliased.path, PathBuf::from("/images/title card.png"));
        assert_eq!(aliased.display_alias(), "intro");

        let degenerate = TargetSpec::parse("=oops.png");
        assert_eq!(degenerate.path, PathBuf::from("=oops.png"));
    }

    #[test]
    fn test_registered_target_has_empty_list() {
        let mut result = ScanResult::new();
        result.register("logo");

        assert_eq!(result.ranges("logo"), Some(&[][..]));
        assert_eq!(result.total_ranges(), 0);
        assert!(result.ranges("other").is_none());
    }

    #[test]
    fn test_ranges_for_video() {
        let mut result = ScanResult::new();
        result.extend("logo", vec![sample_range("a.mp4", 1, 2), sample_range("b.mp4", 5, 9)]);
        result.extend("card", vec![sample_range("b.mp4", 20, 20)]);

        let in_b: Vec<_> = result.ranges_for_video(Path::new("/videos/b.mp4")).collect();
        assert_eq!(in_b.len(), 2);
        assert!(in_b.iter().all(|r| r.video == "b.mp4"));
    }

    #[test]
    fn test_ranges_for_video_ignores_current_dir_prefix() {
        let mut found = sample_range("a.mp4", 1, 2);
        found.video_path = PathBuf::from("./media/a.mp4");
        let mut result = ScanResult::new();
        result.extend("logo", vec![found]);

        assert_eq!(result.ranges_for_video(Path::new("media/a.mp4")).count(), 1);
        assert_eq!(result.ranges_for_video(Path::new("./media/./a.mp4")).count(), 1);
        assert_eq!(result.ranges_for_video(Path::new("media/b.mp4")).count(), 0);
    }

    #[test]
    fn test_ranges_for_video_resolves_same_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("clips")).unwrap();
        let video = dir.path().join("clips").join("a.mp4");
        std::fs::write(&video, b"").unwrap();

        let mut found = sample_range("a.mp4", 1, 2);
        found.video_path = video;
        let mut result = ScanResult::new();
        result.extend("logo", vec![found]);

        let roundabout = dir.path().join("clips").join("..").join("clips").join("a.mp4");
        assert_eq!(result.ranges_for_video(&roundabout).count(), 1);
    }

    #[test]
    fn test_first_video_skips_empty_aliases() {
        let mut result = ScanResult::new();
        assert_eq!(result.first_video(), None);

        result.register("aaa");
        result.extend("card", vec![sample_range("b.mp4", 5, 9)]);
        result.extend("logo", vec![sample_range("a.mp4", 1, 2)]);

        assert_eq!(result.first_video(), Some(Path::new("/videos/b.mp4")));
    }

    #[test]
    fn test_json_shape() {
        let mut result = ScanResult::new();
        result.extend("logo", vec![sample_range("a.mp4", 10, 15)]);

        let value = serde_json::to_value(&result).unwrap();
        let first = &value["logo"][0];
        assert_eq!(first["start_frame"], 10);
        assert_eq!(first["end_frame"], 15);
        assert_eq!(first["start_time"], 1.0);
        assert_eq!(first["video"], "a.mp4");

        let back: ScanResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(sample_range("a.mp4", 7, 7).range.frame_count(), 1);
        assert_eq!(sample_range("a.mp4", 10, 20).range.frame_count(), 11);
    }
}
