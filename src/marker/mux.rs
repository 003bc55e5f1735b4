use std::path::Path;

use crate::error::{MarkerError, Result};
use crate::marker::MarkerMode;
use crate::media::MediaCommand;

/// Final encode of the intermediate tracks into `output`
///
/// Video is always re-encoded as H.264 in yuv420p. Audio-only output lets
/// the engine pick the codec from the container.
pub fn mux_command(
    mode: MarkerMode,
    video: Option<&Path>,
    audio: Option<&Path>,
    output: &Path,
) -> Result<MediaCommand> {
    let missing = |track: &str| MarkerError::InvalidRequest {
        details: format!("{:?} mode needs a {} track", mode, track),
    };

    let command = MediaCommand::new(output).arg("-y");
    let command = match mode {
        MarkerMode::Video => command
            .input(video.ok_or_else(|| missing("video"))?)
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]),
        MarkerMode::Audio => command.input(audio.ok_or_else(|| missing("audio"))?),
        MarkerMode::Both => command
            .input(video.ok_or_else(|| missing("video"))?)
            .input(audio.ok_or_else(|| missing("audio"))?)
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest"]),
    };

    Ok(command)
}
