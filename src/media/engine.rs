use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::video::{Frame, VideoProperties};

/// One invocation of the external media engine
///
/// Arguments are engine arguments without the program name; the output
/// path is kept separate and always passed last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCommand {
    args: Vec<String>,
    output: PathBuf,
}

impl MediaCommand {
    pub fn new<P: Into<PathBuf>>(output: P) -> Self {
        Self {
            args: Vec::new(),
            output: output.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `-i <path>`
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        let path = path.as_ref().display().to_string();
        self.arg("-i").arg(path)
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// True if `flag` is directly followed by `value`
    pub fn has_option(&self, flag: &str, value: &str) -> bool {
        self.args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    /// Value following the first occurrence of `flag`
    pub fn option(&self, flag: &str) -> Option<&str> {
        self.args.windows(2)
            .find(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
    }
}

/// What the engine reported back
#[derive(Debug, Clone, Default)]
pub struct MediaOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl MediaOutput {
    /// Last non-empty line of stderr, the usual place for the actual error
    pub fn diagnostic(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no diagnostic output")
    }
}

/// Sink for raw frames of a video being encoded
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the artifact. Dropping a writer without calling
    /// `finish` abandons it.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// External encode/mix/mux collaborator
///
/// `run` returns `Err` only when the engine could not be invoked at all;
/// a failing invocation comes back as `Ok` with `success == false`.
pub trait MediaEngine: Send + Sync {
    fn run(&self, command: &MediaCommand) -> Result<MediaOutput>;

    /// Start encoding a video track of the given geometry and rate into `path`
    fn video_writer(
        &self,
        path: &Path,
        properties: &VideoProperties,
    ) -> Result<Box<dyn FrameWriter>>;
}
