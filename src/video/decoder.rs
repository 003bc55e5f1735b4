use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{MediaError, Result, VideoError};
use crate::video::types::{DecodedFrame, Frame, VideoProperties};

/// Opens videos for sequential frame decoding
pub trait VideoDecoder: Send + Sync {
    /// Open a video for decoding from its first frame
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>>;

    /// Read the stream properties without decoding frames
    fn probe(&self, path: &Path) -> Result<VideoProperties> {
        let source = self.open(path)?;
        let properties = *source.properties();
        source.release();
        Ok(properties)
    }
}

/// An opened video yielding frames in presentation order
pub trait VideoSource: Send {
    fn properties(&self) -> &VideoProperties;

    /// Next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;

    /// Release decoder resources
    fn release(self: Box<Self>) {}
}

/// Decoder backed by the `ffprobe` and `ffmpeg` executables
///
/// Properties come from ffprobe's JSON output; frames are streamed from
/// ffmpeg as raw rgb24 over a pipe so no temporary files are needed.
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegDecoder {
    pub fn new<P: Into<PathBuf>>(ffmpeg: P, ffprobe: P) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn check_available(&self) -> bool {
        [&self.ffmpeg, &self.ffprobe].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        let properties = self.probe(path)?;

        let child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::SpawnFailed {
                program: self.ffmpeg.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(
            "Opened {} ({}x{} @ {:.2} fps, {} frames)",
            path.display(),
            properties.width,
            properties.height,
            properties.frame_rate,
            properties.total_frame_count
        );

        Ok(Box::new(FfmpegVideoSource::new(child, properties)?))
    }

    fn probe(&self, path: &Path) -> Result<VideoProperties> {
        if !path.is_file() {
            return Err(VideoError::OpenFailed {
                path: path.display().to_string(),
            }
            .into());
        }

        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-count_packets"])
            .arg("-show_entries")
            .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,nb_read_packets")
            .args(["-of", "json"])
            .arg(path)
            .output()
            .map_err(|e| MediaError::SpawnFailed {
                program: self.ffprobe.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(VideoError::OpenFailed {
                path: path.display().to_string(),
            }
            .into());
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&json).map_err(|reason| {
            VideoError::ProbeFailed {
                path: path.display().to_string(),
                reason,
            }
            .into()
        })
    }
}

struct FfmpegVideoSource {
    child: Option<Child>,
    reader: BufReader<ChildStdout>,
    properties: VideoProperties,
    next_index: u64,
}

impl FfmpegVideoSource {
    fn new(mut child: Child, properties: VideoProperties) -> Result<Self> {
        let stdout = child.stdout.take().ok_or_else(|| VideoError::DecodingFailed {
            reason: "ffmpeg stdout was not captured".to_string(),
        })?;

        Ok(Self {
            child: Some(child),
            reader: BufReader::with_capacity(properties.frame_size().max(8192), stdout),
            properties,
            next_index: 0,
        })
    }

    fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Killing an already exited process is harmless
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl VideoSource for FfmpegVideoSource {
    fn properties(&self) -> &VideoProperties {
        &self.properties
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let mut data = vec![0u8; self.properties.frame_size()];

        match self.reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("End of stream after {} frames", self.next_index);
                return Ok(None);
            }
            Err(e) => {
                return Err(VideoError::DecodingFailed {
                    reason: e.to_string(),
                }
                .into());
            }
        }

        let frame = Frame::from_rgb_bytes(self.properties.width, self.properties.height, data)
            .ok_or_else(|| VideoError::DecodingFailed {
                reason: "frame buffer size mismatch".to_string(),
            })?;

        let index = self.next_index;
        self.next_index += 1;

        Ok(Some(DecodedFrame {
            index,
            timestamp: self.properties.time_of_frame(index),
            frame,
        }))
    }

    fn release(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
}

/// Turn ffprobe's `-of json` stream report into [`VideoProperties`]
pub(crate) fn parse_probe_output(json: &str) -> std::result::Result<VideoProperties, String> {
    let output: ProbeOutput = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let stream = output.streams.into_iter().next()
        .ok_or_else(|| "no video stream".to_string())?;

    let width = stream.width.filter(|&w| w > 0).ok_or("missing width")?;
    let height = stream.height.filter(|&h| h > 0).ok_or("missing height")?;

    let frame_rate = stream.avg_frame_rate.as_deref()
        .and_then(parse_rational)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational))
        .ok_or("missing frame rate")?;

    let total_frame_count = stream.nb_frames.as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| stream.nb_read_packets.as_deref().and_then(|n| n.parse::<u64>().ok()))
        .unwrap_or_else(|| {
            warn!("Stream reports no frame count, progress will be approximate");
            0
        });

    Ok(VideoProperties {
        width,
        height,
        frame_rate,
        total_frame_count,
    })
}

/// Parse "30000/1001" or "25" style rates; zero and malformed rates are rejected
fn parse_rational(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}
