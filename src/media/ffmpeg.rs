use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::{MediaError, Result};
use crate::media::engine::{FrameWriter, MediaCommand, MediaEngine, MediaOutput};
use crate::video::{Frame, VideoProperties};

/// Media engine driving the `ffmpeg` executable
pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn check_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaEngine for FfmpegEngine {
    fn run(&self, command: &MediaCommand) -> Result<MediaOutput> {
        debug!(
            "Running {} {:?} {}",
            self.program(),
            command.arguments(),
            command.output().display()
        );

        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error"])
            .args(command.arguments())
            .arg(command.output())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| MediaError::SpawnFailed {
                program: self.program(),
                reason: e.to_string(),
            })?;

        Ok(MediaOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn video_writer(
        &self,
        path: &Path,
        properties: &VideoProperties,
    ) -> Result<Box<dyn FrameWriter>> {
        let size = format!("{}x{}", properties.width, properties.height);
        let rate = format!("{}", properties.frame_rate);

        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", size.as_str(), "-r", rate.as_str(), "-i", "-"])
            .args(["-c:v", "mpeg4", "-q:v", "2", "-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::SpawnFailed {
                program: self.program(),
                reason: e.to_string(),
            })?;

        let (stdin, stderr) = match (child.stdin.take(), child.stderr.take()) {
            (Some(stdin), Some(stderr)) => (stdin, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MediaError::WriteFailed {
                    reason: "encoder pipes were not captured".to_string(),
                }
                .into());
            }
        };

        // The encoder blocks once its stderr pipe is full, so read it as it comes
        let stderr_drain = match thread::Builder::new()
            .name("frame-scout-encoder-stderr".to_string())
            .spawn(move || drain(stderr))
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        info!("Encoding {} @ {} fps into {}", size, rate, path.display());

        Ok(Box::new(FfmpegFrameWriter {
            program: self.program(),
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frame_size: properties.frame_size(),
        }))
    }
}

/// Collect everything the child writes to stderr until it closes the pipe
fn drain(stderr: ChildStderr) -> String {
    BufReader::new(stderr)
        .lines()
        .map_while(std::result::Result::ok)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pipes rgb24 frames into a running ffmpeg encoder
struct FfmpegFrameWriter {
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<String>>,
    frame_size: usize,
}

impl FfmpegFrameWriter {
    fn collected_stderr(&mut self) -> String {
        self.stderr_drain
            .take()
            .and_then(|drain| drain.join().ok())
            .unwrap_or_default()
    }
}

impl FrameWriter for FfmpegFrameWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.as_rgb_bytes();
        if bytes.len() != self.frame_size {
            return Err(MediaError::WriteFailed {
                reason: format!(
                    "frame has {} bytes, encoder expects {}",
                    bytes.len(),
                    self.frame_size
                ),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| MediaError::WriteFailed {
            reason: "encoder input already closed".to_string(),
        })?;

        stdin.write_all(bytes).map_err(|e| MediaError::WriteFailed {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        // Closing stdin signals end of input
        drop(self.stdin.take());

        let mut child = self.child.take().ok_or_else(|| MediaError::WriteFailed {
            reason: "encoder already finished".to_string(),
        })?;

        let status = child.wait().map_err(|e| MediaError::WriteFailed {
            reason: e.to_string(),
        })?;
        let stderr = self.collected_stderr();

        if !status.success() {
            return Err(MediaError::CommandFailed {
                program: self.program.clone(),
                stderr,
            }
            .into());
        }
        if !stderr.is_empty() {
            debug!("{} reported: {}", self.program, stderr);
        }

        Ok(())
    }
}

impl Drop for FfmpegFrameWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("Abandoning unfinished {} encode", self.program);
            let _ = child.kill();
            let _ = child.wait();
        }
        // Killing the child closes the pipe, so the drain thread ends
        self.collected_stderr();
    }
}
