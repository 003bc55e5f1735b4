use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::config::MarkerConfig;
use crate::error::{MediaError, Result};
use crate::events::{Observer, Reporter};
use crate::marker::{MarkedRange, MarkerOutcome};
use crate::media::{MediaCommand, MediaEngine};

/// Millisecond offsets at which a marker tone starts
///
/// Each range contributes two tones: one on its first frame and one that
/// ends on its last frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToneSchedule {
    pub offsets_ms: Vec<u64>,
}

impl ToneSchedule {
    pub fn from_ranges(ranges: &[MarkedRange], frame_rate: f64, tone_duration: f64) -> Self {
        if frame_rate <= 0.0 {
            return Self::default();
        }

        let offsets_ms = ranges
            .iter()
            .flat_map(|range| {
                let start = range.start_frame as f64 / frame_rate * 1000.0;
                let end = (range.end_frame as f64 / frame_rate - tone_duration) * 1000.0;
                [start as u64, end.max(0.0) as u64]
            })
            .collect();

        Self { offsets_ms }
    }

    pub fn len(&self) -> usize {
        self.offsets_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets_ms.is_empty()
    }
}

/// ffmpeg invocation mixing the scheduled tones over a silent stereo base
/// of `duration` seconds
pub fn tone_mix_command(
    schedule: &ToneSchedule,
    duration: f64,
    config: &MarkerConfig,
    output: &Path,
) -> MediaCommand {
    let base = format!("anullsrc=r={}:cl=stereo:d={}", config.sample_rate, duration);
    let command = MediaCommand::new(output).args(["-y", "-f", "lavfi", "-i"]).arg(base);

    if schedule.is_empty() {
        return command;
    }

    let mut filter = String::new();
    let mut inputs = String::from("[0:a]");
    for (i, pair) in schedule.offsets_ms.chunks(2).enumerate() {
        for (label, offset) in ["s", "e"].iter().zip(pair) {
            filter.push_str(&format!(
                "sine=f={}:d={},adelay={}|{}[{}{}];",
                config.tone_frequency, config.tone_duration, offset, offset, label, i
            ));
            inputs.push_str(&format!("[{}{}]", label, i));
        }
    }
    filter.push_str(&format!("{}amix=inputs={}:normalize=0[aout]", inputs, schedule.len() + 1));

    command.args(["-filter_complex", filter.as_str(), "-map", "[aout]"])
}

/// Write `duration` seconds of 16-bit stereo silence
pub fn write_silence(path: &Path, duration: f64, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let write_failed = |e: hound::Error| MediaError::WriteFailed {
        reason: e.to_string(),
    };

    let mut writer = WavWriter::create(path, spec).map_err(write_failed)?;
    let frames = (duration.max(0.0) * sample_rate as f64).round() as u64;
    for _ in 0..frames * spec.channels as u64 {
        writer.write_sample(0i16).map_err(write_failed)?;
    }
    writer.finalize().map_err(write_failed)?;
    Ok(())
}

/// Builds the audible marker track
pub struct AudioMarkerScheduler<'a> {
    media: &'a dyn MediaEngine,
    config: &'a MarkerConfig,
}

impl<'a> AudioMarkerScheduler<'a> {
    pub fn new(media: &'a dyn MediaEngine, config: &'a MarkerConfig) -> Self {
        Self { media, config }
    }

    /// Synthesize tones for every range into `path`
    ///
    /// If the media engine fails the track falls back to plain silence of
    /// the same length; only a failing fallback is an error.
    pub fn build_audio_track(
        &self,
        duration: f64,
        ranges: &[MarkedRange],
        frame_rate: f64,
        path: &Path,
        observer: &dyn Observer<MarkerOutcome>,
    ) -> Result<()> {
        let reporter = Reporter::new(observer);
        reporter.info("Generating audio tones...");

        let schedule = ToneSchedule::from_ranges(ranges, frame_rate, self.config.tone_duration);
        let command = tone_mix_command(&schedule, duration, self.config, path);

        let failure = match self.media.run(&command) {
            Ok(output) if output.success => None,
            Ok(output) => Some(output.diagnostic().to_string()),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => reporter.info(format!("Audio tones generated ({} tones).", schedule.len())),
            Some(diagnostic) => {
                reporter.warn(format!(
                    "FFmpeg Audio Error: {}. Falling back to silence.",
                    diagnostic
                ));
                write_silence(path, duration, self.config.sample_rate)?;
            }
        }

        Ok(())
    }
}
