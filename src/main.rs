use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use frame_scout::{
    config::Config,
    events::{ChannelObserver, Event},
    export,
    marker::{MarkerMode, MarkerOutcome, MarkerPipeline, MarkerRequest},
    matching::{ScanResult, TargetSpec},
    media::FfmpegEngine,
    scan::{ScanEngine, ScanJob},
    video::FfmpegDecoder,
    ScoutError,
};

#[derive(Parser)]
#[command(
    name = "frame-scout",
    version,
    about = "Find target images in videos and generate marker media",
    long_about = "Frame-Scout scans videos frame by frame for one or more target images, \
                  reports the time ranges where each target is on screen and can render \
                  those ranges into a marker video and/or audio track."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan videos for target images
    Scan {
        /// Video to scan (repeatable, scanned in order)
        #[arg(short = 'i', long = "video", required = true)]
        videos: Vec<PathBuf>,

        /// Target image as PATH or ALIAS=PATH (repeatable)
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// Match threshold, overrides the configuration (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Write the ranges as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the ranges as JSON (input for `mark`)
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Generate a marker file from scan results
    Mark {
        /// Source video; defaults to the video of the first range in the results
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// JSON results written by `scan --json`
        #[arg(short, long)]
        results: PathBuf,

        /// Output media file; defaults to <source stem>_markers.mp4 (.wav for audio)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tracks to generate
        #[arg(short, long, value_enum, default_value_t = MarkerMode::Both)]
        mode: MarkerMode,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting Frame-Scout v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        error!("{}", describe_error(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Scan {
            videos,
            targets,
            threshold,
            csv,
            json,
        } => {
            if let Some(threshold) = threshold {
                config.scan.threshold = threshold;
            }
            config.validate()?;
            let targets = targets.iter().map(|t| TargetSpec::parse(t)).collect();
            run_scan(&config, ScanJob::new(videos, targets), csv, json).await
        }
        Command::Mark {
            source,
            results,
            output,
            mode,
        } => {
            config.validate()?;
            run_mark(&config, source, &results, output, mode).await
        }
    }
}

/// Friendly text for crate errors, the full cause chain for everything else
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ScoutError>() {
        Some(scout) => scout.user_message(),
        None => format!("{:#}", err),
    }
}

fn decoder(config: &Config) -> Result<Arc<FfmpegDecoder>> {
    let decoder = FfmpegDecoder::new(config.tools.ffmpeg.clone(), config.tools.ffprobe.clone());
    if !decoder.check_available() {
        bail!(
            "ffmpeg/ffprobe not found ({} / {}). \
             Install FFmpeg or set [tools] in the configuration.",
            config.tools.ffmpeg.display(),
            config.tools.ffprobe.display()
        );
    }
    Ok(Arc::new(decoder))
}

async fn run_scan(
    config: &Config,
    job: ScanJob,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let engine = ScanEngine::new(decoder(config)?, &config.scan)?;

    info!(
        "Scanning {} videos for {} targets (threshold {})",
        job.videos.len(),
        job.targets.len(),
        config.scan.threshold
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = engine.start(job, ChannelObserver::new(tx))?;
    let control = handle.control();

    drain_events(rx, "Scan", || {
        warn!("Interrupt received, stopping scan. Closed ranges will still be exported.");
        control.stop();
    })
    .await;

    let result = tokio::task::spawn_blocking(move || handle.join()).await??;

    print_summary(&result);

    if let Some(path) = csv {
        export::write_csv(&result, &path)?;
    }
    if let Some(path) = json {
        export::write_json(&result, &path)?;
    }

    Ok(())
}

/// Source and output for `mark`, filling in whatever was not given
fn resolve_mark_paths(
    result: &ScanResult,
    results: &Path,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    mode: MarkerMode,
) -> Result<(PathBuf, PathBuf)> {
    let source = match source {
        Some(source) => source,
        None => {
            let first = result.first_video().ok_or_else(|| {
                anyhow!(
                    "{} has no ranges to take a source video from; pass --source",
                    results.display()
                )
            })?;
            info!("Using source video from the results: {}", first.display());
            first.to_path_buf()
        }
    };

    let output = match output {
        Some(output) => output,
        None => {
            let output = mode.default_output(&source);
            info!("Writing marker to {}", output.display());
            output
        }
    };

    Ok((source, output))
}

async fn run_mark(
    config: &Config,
    source: Option<PathBuf>,
    results: &Path,
    output: Option<PathBuf>,
    mode: MarkerMode,
) -> Result<()> {
    let result = export::read_json(results)?;
    let (source, output) = resolve_mark_paths(&result, results, source, output, mode)?;

    let request = MarkerRequest::from_scan(&result, &source, output, mode);
    if request.ranges.is_empty() {
        warn!(
            "{} has no ranges for {}; the marker will be empty",
            results.display(),
            source.display()
        );
    }

    let media = FfmpegEngine::new(config.tools.ffmpeg.clone());
    let pipeline = MarkerPipeline::new(decoder(config)?, Arc::new(media), config.marker.clone());

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = pipeline.start(request, ChannelObserver::new(tx))?;

    drain_events(rx, "Marker generation", || {
        warn!("Interrupt received, cancelling marker generation.");
        handle.cancel();
    })
    .await;

    match tokio::task::spawn_blocking(move || handle.join()).await?? {
        MarkerOutcome::Completed(path) => {
            info!("Marker saved to: {:?}", path);
            Ok(())
        }
        MarkerOutcome::Cancelled => {
            warn!("Marker generation cancelled, nothing was written");
            Ok(())
        }
        MarkerOutcome::Failed(reason) => bail!("Marker generation failed: {}", reason),
    }
}

/// Show progress until the worker finishes; the first Ctrl-C calls `interrupt`
async fn drain_events<T, F: FnMut()>(
    mut rx: UnboundedReceiver<Event<T>>,
    task: &str,
    mut interrupt: F,
) {
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(Event::Progress(percent)) => info!("{}: {}%", task, percent),
                // Log lines already went through tracing on the worker
                Some(Event::Log(..)) => {}
                Some(Event::Finished(_)) | None => break,
            },
            _ = signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                interrupt();
            }
        }
    }
}

fn print_summary(result: &ScanResult) {
    if result.is_empty() {
        println!("No targets were scanned.");
        return;
    }

    for (alias, ranges) in result.iter() {
        println!("{} ({} ranges)", alias, ranges.len());
        for found in ranges {
            println!(
                "  {}  {:>8.2}s - {:>8.2}s  frames {}-{}",
                found.video,
                found.range.start_time,
                found.range.end_time,
                found.range.start_frame,
                found.range.end_frame
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_scout::error::MediaError;
    use frame_scout::matching::{FrameRange, MatchRange};

    fn results_with(video_path: &str) -> ScanResult {
        let mut result = ScanResult::new();
        result.register("empty");
        result.extend(
            "logo",
            vec![MatchRange {
                range: FrameRange {
                    start_frame: 3,
                    end_frame: 9,
                    start_time: 0.1,
                    end_time: 0.3,
                },
                video: "clip.mp4".to_string(),
                video_path: PathBuf::from(video_path),
                target_path: PathBuf::from("/targets/logo.png"),
            }],
        );
        result
    }

    #[test]
    fn test_mark_defaults_come_from_results() {
        let result = results_with("/videos/clip.mp4");
        let (source, output) =
            resolve_mark_paths(&result, Path::new("r.json"), None, None, MarkerMode::Both)
                .unwrap();

        assert_eq!(source, PathBuf::from("/videos/clip.mp4"));
        assert_eq!(output, PathBuf::from("/videos/clip_markers.mp4"));

        let (_, audio) =
            resolve_mark_paths(&result, Path::new("r.json"), None, None, MarkerMode::Audio)
                .unwrap();
        assert_eq!(audio, PathBuf::from("/videos/clip_markers.wav"));
    }

    #[test]
    fn test_mark_explicit_paths_win() {
        let result = results_with("/videos/clip.mp4");
        let (source, output) = resolve_mark_paths(
            &result,
            Path::new("r.json"),
            Some(PathBuf::from("other.mp4")),
            Some(PathBuf::from("/out/m.mp4")),
            MarkerMode::Video,
        )
        .unwrap();

        assert_eq!(source, PathBuf::from("other.mp4"));
        assert_eq!(output, PathBuf::from("/out/m.mp4"));

        let (_, output) = resolve_mark_paths(
            &result,
            Path::new("r.json"),
            Some(PathBuf::from("other.mp4")),
            None,
            MarkerMode::Video,
        )
        .unwrap();
        assert_eq!(output, PathBuf::from("other_markers.mp4"));
    }

    #[test]
    fn test_mark_without_source_or_ranges_fails() {
        let mut result = ScanResult::new();
        result.register("logo");

        let err = resolve_mark_paths(&result, Path::new("r.json"), None, None, MarkerMode::Both)
            .unwrap_err();
        assert!(err.to_string().contains("pass --source"));
    }

    #[test]
    fn test_describe_error_uses_user_message() {
        let scout: ScoutError = MediaError::SpawnFailed {
            program: "ffmpeg".to_string(),
            reason: "not found".to_string(),
        }
        .into();
        let described = describe_error(&anyhow::Error::from(scout));
        assert!(described.contains("Please install FFmpeg"));

        let plain = anyhow!("disk full").context("writing results.csv");
        assert_eq!(describe_error(&plain), "writing results.csv: disk full");
    }
}
