use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::config::MarkerConfig;
use crate::error::{MarkerError, Result, ScoutError, VideoError};
use crate::events::{Observer, Reporter};
use crate::marker::artifacts::TempArtifacts;
use crate::marker::audio::AudioMarkerScheduler;
use crate::marker::compositor::FrameCompositor;
use crate::marker::mux::mux_command;
use crate::marker::{MarkerOutcome, MarkerRequest, StageOutcome};
use crate::media::MediaEngine;
use crate::video::{VideoDecoder, VideoProperties};

/// Cooperative cancellation flag shared with a running marker job
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Orchestrates the video, audio and mux stages of marker generation
pub struct MarkerPipeline {
    decoder: Arc<dyn VideoDecoder>,
    media: Arc<dyn MediaEngine>,
    config: MarkerConfig,
    cancel: CancelToken,
}

/// Internal early exit of a run
enum Abort {
    Cancelled,
    Failed(String),
}

impl From<ScoutError> for Abort {
    fn from(e: ScoutError) -> Self {
        Abort::Failed(e.to_string())
    }
}

impl MarkerPipeline {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        media: Arc<dyn MediaEngine>,
        config: MarkerConfig,
    ) -> Self {
        Self {
            decoder,
            media,
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the pipeline on a dedicated worker thread
    pub fn start<O>(self, request: MarkerRequest, observer: O) -> Result<MarkerHandle>
    where
        O: Observer<MarkerOutcome> + 'static,
    {
        let cancel = self.cancel.clone();
        let worker = thread::Builder::new()
            .name("frame-scout-marker".to_string())
            .spawn(move || self.run(&request, &observer))?;

        Ok(MarkerHandle { cancel, worker })
    }

    /// Run the pipeline on the current thread
    ///
    /// Temporary tracks are gone when this returns, whatever the outcome.
    /// The observer's `on_finished` fires exactly once.
    pub fn run(
        &self,
        request: &MarkerRequest,
        observer: &dyn Observer<MarkerOutcome>,
    ) -> MarkerOutcome {
        let mut reporter = Reporter::new(observer);

        let outcome = match self.execute(request, observer, &mut reporter) {
            Ok(path) => {
                reporter.progress(100);
                reporter.info(format!("Marker file created successfully: {}", path.display()));
                MarkerOutcome::Completed(path)
            }
            Err(Abort::Cancelled) => {
                reporter.info("Marker generation cancelled.");
                MarkerOutcome::Cancelled
            }
            Err(Abort::Failed(reason)) => {
                reporter.error(format!("Marker generation failed: {}", reason));
                MarkerOutcome::Failed(reason)
            }
        };

        reporter.finished(&outcome);
        outcome
    }

    fn execute(
        &self,
        request: &MarkerRequest,
        observer: &dyn Observer<MarkerOutcome>,
        reporter: &mut Reporter<'_, MarkerOutcome>,
    ) -> std::result::Result<PathBuf, Abort> {
        validate_request(request)?;
        self.checkpoint()?;

        let properties = self.decoder.probe(&request.source_video)?;
        check_properties(&properties)?;
        reporter.info(format!(
            "Generating {:?} marker for {} ({} ranges, {} frames @ {:.2} fps)",
            request.mode,
            request.source_video.display(),
            request.ranges.len(),
            properties.total_frame_count,
            properties.frame_rate
        ));

        let work_dir = self.work_dir(&request.output)?;
        let mut artifacts = TempArtifacts::new(&work_dir);

        let mut video_track = None;
        if request.mode.includes_video() {
            let path = artifacts.allocate("video", "mp4");
            let stage = FrameCompositor::new(self.media.as_ref()).build_video_track(
                &properties,
                &request.ranges,
                &path,
                &self.cancel,
                observer,
            );
            match stage.map_err(|e| stage_failed("video", e))? {
                StageOutcome::Completed => {}
                StageOutcome::Cancelled => return Err(Abort::Cancelled),
            }
            video_track = Some(path);
            reporter.progress(50);
        }

        self.checkpoint()?;

        let mut audio_track = None;
        if request.mode.includes_audio() {
            let path = artifacts.allocate("audio", "wav");
            AudioMarkerScheduler::new(self.media.as_ref(), &self.config)
                .build_audio_track(
                    properties.duration(),
                    &request.ranges,
                    properties.frame_rate,
                    &path,
                    observer,
                )
                .map_err(|e| stage_failed("audio", e))?;
            audio_track = Some(path);
            reporter.progress(75);
        }

        self.checkpoint()?;

        reporter.info("Finalizing output file...");
        let command = mux_command(
            request.mode,
            video_track.as_deref(),
            audio_track.as_deref(),
            &request.output,
        )?;
        let output = self.media.run(&command).map_err(|e| stage_failed("mux", e))?;
        if !output.success {
            reporter.warn(format!("FFmpeg Muxing Error: {}", output.diagnostic()));
            return Err(stage_failed("mux", ScoutError::generic(output.diagnostic())));
        }

        artifacts.cleanup();
        debug!("Removed {} intermediate tracks", artifacts.paths().len());
        Ok(request.output.clone())
    }

    fn checkpoint(&self) -> std::result::Result<(), Abort> {
        if self.cancel.is_cancelled() {
            Err(Abort::Cancelled)
        } else {
            Ok(())
        }
    }

    fn work_dir(&self, output: &Path) -> Result<PathBuf> {
        let dir = match &self.config.work_dir {
            Some(dir) => dir.clone(),
            None => match output.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn validate_request(request: &MarkerRequest) -> Result<()> {
    if request.output.as_os_str().is_empty() {
        return Err(MarkerError::InvalidRequest {
            details: "no output path given".to_string(),
        }
        .into());
    }

    if request.output == request.source_video {
        return Err(MarkerError::InvalidRequest {
            details: format!(
                "output would overwrite the source video {}",
                request.source_video.display()
            ),
        }
        .into());
    }

    if let Some(range) = request.ranges.iter().find(|r| r.start_frame > r.end_frame) {
        return Err(MarkerError::InvalidRequest {
            details: format!(
                "range {}..{} ends before it starts",
                range.start_frame, range.end_frame
            ),
        }
        .into());
    }

    Ok(())
}

fn check_properties(properties: &VideoProperties) -> Result<()> {
    if !(properties.frame_rate.is_finite() && properties.frame_rate > 0.0) {
        return Err(VideoError::InvalidProperties {
            details: format!("frame rate {}", properties.frame_rate),
        }
        .into());
    }
    if properties.width == 0 || properties.height == 0 {
        return Err(VideoError::InvalidProperties {
            details: format!("frame size {}x{}", properties.width, properties.height),
        }
        .into());
    }
    if properties.total_frame_count == 0 {
        return Err(VideoError::InvalidProperties {
            details: "unknown frame count".to_string(),
        }
        .into());
    }
    Ok(())
}

fn stage_failed(stage: &str, error: ScoutError) -> Abort {
    Abort::Failed(
        MarkerError::StageFailed {
            stage: stage.to_string(),
            reason: error.to_string(),
        }
        .to_string(),
    )
}

/// A marker job running on its worker thread
pub struct MarkerHandle {
    cancel: CancelToken,
    worker: JoinHandle<MarkerOutcome>,
}

impl MarkerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn join(self) -> Result<MarkerOutcome> {
        self.worker
            .join()
            .map_err(|_| ScoutError::generic("marker worker panicked"))
    }
}
