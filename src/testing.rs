//! Shared fixtures for unit tests: an in-memory video decoder and a media
//! engine that records what it is asked to do.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use crate::error::{MediaError, Result, VideoError};
use crate::marker::CancelToken;
use crate::media::{FrameWriter, MediaCommand, MediaEngine, MediaOutput};
use crate::video::{DecodedFrame, Frame, VideoDecoder, VideoProperties, VideoSource};

type FrameFn = Arc<dyn Fn(u64) -> RgbImage + Send + Sync>;
type HookFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Save a solid-color PNG and return its path
pub(crate) fn write_png(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    color: [u8; 3],
) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb(color)).save(&path).unwrap();
    path
}

/// A video whose frames are generated on demand
#[derive(Clone)]
pub(crate) struct SyntheticVideo {
    properties: VideoProperties,
    frames: FrameFn,
    hook: Option<HookFn>,
    fail_at: Option<u64>,
}

impl SyntheticVideo {
    pub(crate) fn new<F>(
        width: u32,
        height: u32,
        frame_rate: f64,
        total_frame_count: u64,
        frames: F,
    ) -> Self
    where
        F: Fn(u64) -> RgbImage + Send + Sync + 'static,
    {
        Self {
            properties: VideoProperties {
                width,
                height,
                frame_rate,
                total_frame_count,
            },
            frames: Arc::new(frames),
            hook: None,
            fail_at: None,
        }
    }

    /// Called with each frame index just before that frame is handed out
    pub(crate) fn on_frame<F>(mut self, hook: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Decoding fails when this frame index is reached
    pub(crate) fn fail_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[derive(Default)]
pub(crate) struct SyntheticDecoder {
    videos: Mutex<HashMap<PathBuf, SyntheticVideo>>,
}

impl SyntheticDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_video<P: Into<PathBuf>>(self, path: P, video: SyntheticVideo) -> Self {
        self.insert(path, video);
        self
    }

    pub(crate) fn insert<P: Into<PathBuf>>(&self, path: P, video: SyntheticVideo) {
        self.videos.lock().unwrap().insert(path.into(), video);
    }
}

impl VideoDecoder for SyntheticDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        let video = self
            .videos
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| VideoError::OpenFailed {
                path: path.display().to_string(),
            })?;

        Ok(Box::new(SyntheticSource { video, next: 0 }))
    }
}

struct SyntheticSource {
    video: SyntheticVideo,
    next: u64,
}

impl VideoSource for SyntheticSource {
    fn properties(&self) -> &VideoProperties {
        &self.video.properties
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let index = self.next;
        if index >= self.video.properties.total_frame_count {
            return Ok(None);
        }
        if self.video.fail_at == Some(index) {
            return Err(VideoError::DecodingFailed {
                reason: format!("corrupt frame {}", index),
            }
            .into());
        }
        if let Some(hook) = &self.video.hook {
            hook(index);
        }

        self.next += 1;
        Ok(Some(DecodedFrame {
            index,
            timestamp: self.video.properties.time_of_frame(index),
            frame: Frame::new((self.video.frames)(index)),
        }))
    }
}

/// Media engine stub: records commands and frames, touches output files
pub(crate) struct RecordingMedia {
    commands: Mutex<Vec<MediaCommand>>,
    frames: Arc<Mutex<Vec<Frame>>>,
    fail_when: Option<Box<dyn Fn(&MediaCommand) -> bool + Send + Sync>>,
    cancel_after: Option<(usize, CancelToken)>,
    fail_writer: bool,
}

impl RecordingMedia {
    pub(crate) fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            frames: Arc::new(Mutex::new(Vec::new())),
            fail_when: None,
            cancel_after: None,
            fail_writer: false,
        }
    }

    /// Matching commands come back unsuccessful
    pub(crate) fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MediaCommand) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Trip `token` once `frames` frames have been written
    pub(crate) fn cancel_after(mut self, frames: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((frames, token));
        self
    }

    /// Video writers cannot be opened
    pub(crate) fn fail_writer(mut self) -> Self {
        self.fail_writer = true;
        self
    }

    pub(crate) fn commands(&self) -> Vec<MediaCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }
}

impl MediaEngine for RecordingMedia {
    fn run(&self, command: &MediaCommand) -> Result<MediaOutput> {
        self.commands.lock().unwrap().push(command.clone());

        if self.fail_when.as_ref().is_some_and(|fail| fail(command)) {
            return Ok(MediaOutput {
                success: false,
                stdout: String::new(),
                stderr: "simulated failure\n".to_string(),
            });
        }

        fs::write(command.output(), b"media")?;
        Ok(MediaOutput {
            success: true,
            ..MediaOutput::default()
        })
    }

    fn video_writer(
        &self,
        path: &Path,
        _properties: &VideoProperties,
    ) -> Result<Box<dyn FrameWriter>> {
        if self.fail_writer {
            return Err(MediaError::SpawnFailed {
                program: "recording".to_string(),
                reason: "writer disabled".to_string(),
            }
            .into());
        }

        fs::write(path, b"")?;
        Ok(Box::new(RecordingWriter {
            frames: self.frames.clone(),
            written: 0,
            cancel_after: self.cancel_after.clone(),
        }))
    }
}

struct RecordingWriter {
    frames: Arc<Mutex<Vec<Frame>>>,
    written: usize,
    cancel_after: Option<(usize, CancelToken)>,
}

impl FrameWriter for RecordingWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        self.written += 1;

        if let Some((limit, token)) = &self.cancel_after {
            if self.written >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
