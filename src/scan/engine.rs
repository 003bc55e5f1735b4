use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::RgbImage;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::config::ScanConfig;
use crate::error::{Result, ScoutError};
use crate::events::{Observer, Reporter};
use crate::matching::types::file_label;
use crate::matching::{
    group_matches, Comparator, MatchEvent, MatchRange, ScanResult, Target, TargetSpec,
};
use crate::scan::control::{EnginePhase, ScanControl};
use crate::video::VideoDecoder;

/// Videos to scan and targets to look for
#[derive(Debug, Clone, Default)]
pub struct ScanJob {
    pub videos: Vec<PathBuf>,
    pub targets: Vec<TargetSpec>,
}

impl ScanJob {
    pub fn new(videos: Vec<PathBuf>, targets: Vec<TargetSpec>) -> Self {
        Self { videos, targets }
    }
}

/// Frame-by-frame scanner
///
/// Every decoded frame is compared once against every loaded target.
/// Matches are accumulated per target and per video and collapsed into
/// [`MatchRange`]s when the video is exhausted.
pub struct ScanEngine {
    decoder: Arc<dyn VideoDecoder>,
    comparator: Comparator,
    progress_interval: u64,
    pool: Option<ThreadPool>,
    control: ScanControl,
}

/// What scanning one video produced
struct VideoScan {
    ranges: Vec<Vec<MatchRange>>,
    interrupted: bool,
}

impl ScanEngine {
    pub fn new(decoder: Arc<dyn VideoDecoder>, config: &ScanConfig) -> Result<Self> {
        let pool = if config.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("frame-scout-compare-{}", i))
                .build()
                .map_err(|e| {
                    ScoutError::generic(format!("Failed to build comparison pool: {}", e))
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            decoder,
            comparator: Comparator::new(config.threshold),
            progress_interval: config.progress_interval.max(1),
            pool,
            control: ScanControl::new(),
        })
    }

    /// Handle for pausing, resuming or stopping this engine's run
    pub fn control(&self) -> ScanControl {
        self.control.clone()
    }

    /// Run the scan on a dedicated worker thread
    ///
    /// The engine is Running when this returns, so a `pause` sent right
    /// away is honoured before the first frame.
    pub fn start<O>(self, job: ScanJob, observer: O) -> Result<ScanHandle>
    where
        O: Observer<ScanResult> + 'static,
    {
        let control = self.control.clone();
        let started = control.begin();

        let worker = thread::Builder::new()
            .name("frame-scout-scan".to_string())
            .spawn(move || self.scan(started, &job, &observer))
            .map_err(|e| {
                control.finish();
                e
            })?;

        Ok(ScanHandle { control, worker })
    }

    /// Run the scan on the current thread
    ///
    /// Always ends in [`EnginePhase::Done`] with exactly one `on_finished`.
    /// The engine can run again afterwards.
    pub fn run(&mut self, job: &ScanJob, observer: &dyn Observer<ScanResult>) -> ScanResult {
        let started = self.control.begin();
        self.scan(started, job, observer)
    }

    fn scan(
        &self,
        started: bool,
        job: &ScanJob,
        observer: &dyn Observer<ScanResult>,
    ) -> ScanResult {
        let mut reporter = Reporter::new(observer);
        let mut result = ScanResult::new();

        if !started {
            reporter.warn("Scan stopped before it started.");
            self.control.finish();
            reporter.finished(&result);
            return result;
        }

        let targets = self.load_targets(&job.targets, &mut result, &reporter);
        if targets.is_empty() && !job.targets.is_empty() {
            reporter.warn("None of the target images could be loaded.");
        }

        let total_videos = job.videos.len();
        let mut completed = true;

        for (video_index, video_path) in job.videos.iter().enumerate() {
            if !self.control.checkpoint() {
                completed = false;
                break;
            }

            let scan =
                self.scan_video(video_index, total_videos, video_path, &targets, &mut reporter);
            let Some(scan) = scan else {
                continue;
            };

            for (target, ranges) in targets.iter().zip(scan.ranges) {
                result.extend(&target.alias, ranges);
            }

            if scan.interrupted {
                completed = false;
                break;
            }

            reporter.progress(progress_percent(video_index + 1, 0.0, total_videos));
        }

        if completed {
            reporter.progress(100);
            reporter.info(format!(
                "Scan complete: {} ranges across {} targets.",
                result.total_ranges(),
                result.len()
            ));
        } else {
            reporter.info(format!(
                "Scan stopped: keeping {} closed ranges.",
                result.total_ranges()
            ));
        }

        self.control.finish();
        reporter.finished(&result);
        result
    }

    fn load_targets(
        &self,
        specs: &[TargetSpec],
        result: &mut ScanResult,
        reporter: &Reporter<'_, ScanResult>,
    ) -> Vec<Target> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(specs.len());

        for spec in specs {
            match Target::load(spec) {
                Ok(target) => {
                    if !seen.insert(target.alias.clone()) {
                        reporter.warn(format!(
                            "Duplicate alias '{}' for {}, skipping it.",
                            target.alias,
                            spec.path.display()
                        ));
                        continue;
                    }
                    debug!(
                        "Loaded target '{}' ({}x{})",
                        target.alias,
                        target.image.width(),
                        target.image.height()
                    );
                    result.register(&target.alias);
                    targets.push(target);
                }
                Err(e) => {
                    reporter.warn(format!(
                        "Error: Could not load target image {}: {}",
                        spec.path.display(),
                        e
                    ));
                }
            }
        }

        targets
    }

    /// `None` when the video could not be opened
    fn scan_video(
        &self,
        video_index: usize,
        total_videos: usize,
        video_path: &Path,
        targets: &[Target],
        reporter: &mut Reporter<'_, ScanResult>,
    ) -> Option<VideoScan> {
        let video_name = file_label(video_path);
        reporter.info(format!("Processing video: {}", video_name));

        let mut source = match self.decoder.open(video_path) {
            Ok(source) => source,
            Err(e) => {
                reporter.warn(format!(
                    "Error: Could not open video {}: {}",
                    video_path.display(),
                    e
                ));
                return None;
            }
        };

        let properties = *source.properties();
        let prepared: Vec<RgbImage> = targets
            .iter()
            .map(|target| Comparator::prepare(&target.image, properties.width, properties.height))
            .collect();

        let mut events: Vec<Vec<MatchEvent>> = vec![Vec::new(); targets.len()];
        let mut frames_done = 0u64;
        let mut last_index = None;
        let mut interrupted = false;

        loop {
            if !self.control.checkpoint() {
                interrupted = true;
                break;
            }

            let decoded = match source.next_frame() {
                Ok(Some(decoded)) => decoded,
                Ok(None) => break,
                Err(e) => {
                    reporter.warn(format!(
                        "Error: Decoding {} failed after {} frames: {}",
                        video_name, frames_done, e
                    ));
                    break;
                }
            };

            let matches = self.match_frame(decoded.frame.as_image(), &prepared);
            let per_target = targets.iter().zip(events.iter_mut()).zip(matches);
            for ((target, target_events), matched) in per_target {
                if matched {
                    target_events.push(MatchEvent::new(decoded.index, decoded.timestamp));
                    reporter.info(format!(
                        "Match found for '{}' at {:.2}s",
                        target.alias, decoded.timestamp
                    ));
                }
            }

            last_index = Some(decoded.index);
            frames_done += 1;

            if frames_done % self.progress_interval == 0 {
                let fraction = if properties.total_frame_count > 0 {
                    (frames_done as f64 / properties.total_frame_count as f64).min(1.0)
                } else {
                    0.0
                };
                reporter.progress(progress_percent(video_index, fraction, total_videos));
            }
        }

        source.release();

        let ranges = targets
            .iter()
            .zip(&events)
            .map(|(target, target_events)| {
                let mut grouped = group_matches(target_events);

                // A range touching the last scanned frame of an interrupted
                // video may have continued; only closed ranges are kept.
                if interrupted {
                    if let (Some(last), Some(open)) = (last_index, grouped.last()) {
                        if open.end_frame == last {
                            grouped.pop();
                        }
                    }
                }

                reporter.info(format!(
                    "Found {} occurrences for '{}' in {}",
                    grouped.len(),
                    target.alias,
                    video_name
                ));

                grouped
                    .into_iter()
                    .map(|range| MatchRange {
                        range,
                        video: video_name.clone(),
                        video_path: video_path.to_path_buf(),
                        target_path: target.path.clone(),
                    })
                    .collect()
            })
            .collect();

        Some(VideoScan {
            ranges,
            interrupted,
        })
    }

    fn match_frame(&self, frame: &RgbImage, targets: &[RgbImage]) -> Vec<bool> {
        let comparator = self.comparator;
        match &self.pool {
            Some(pool) if targets.len() > 1 => pool.install(|| {
                targets.par_iter().map(|target| comparator.compare(frame, target)).collect()
            }),
            _ => targets.iter().map(|target| comparator.compare(frame, target)).collect(),
        }
    }
}

/// Overall percent while scanning; 100 is reserved for natural completion
fn progress_percent(videos_done: usize, current_fraction: f64, total_videos: usize) -> u8 {
    if total_videos == 0 {
        return 0;
    }
    let overall = (videos_done as f64 + current_fraction) / total_videos as f64;
    ((overall * 100.0) as u8).min(99)
}

/// A scan running on its worker thread
pub struct ScanHandle {
    control: ScanControl,
    worker: JoinHandle<ScanResult>,
}

impl ScanHandle {
    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    pub fn phase(&self) -> EnginePhase {
        self.control.phase()
    }

    pub fn control(&self) -> ScanControl {
        self.control.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and take its result
    pub fn join(self) -> Result<ScanResult> {
        self.worker
            .join()
            .map_err(|_| ScoutError::generic("scan worker panicked"))
    }
}
