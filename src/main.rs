use std::fs;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

use artbooth::config::{CapturePolicy, SessionConfig};
use artbooth::export::{EncodedImage, SnapshotFormat};
use artbooth::segmentation::{ResolutionTier, SegmentationConfig};
use artbooth::session::{self, CancelToken, SessionEvent, Severity, ShootSession};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera device index
    #[arg(short = 'i', long, default_value_t = 0)]
    camera_index: u32,

    /// Output canvas width
    #[arg(long, default_value_t = 1080)]
    width: u32,

    /// Output canvas height
    #[arg(long, default_value_t = 1920)]
    height: u32,

    /// Target composite refresh rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Artwork background reference (path, URL, or data URI)
    /// If not provided, composites over a neutral fill
    #[arg(short, long)]
    background: Option<String>,

    /// Directory relative background references resolve against
    #[arg(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Path to the portrait matting model (ONNX file)
    #[arg(long)]
    model: PathBuf,

    /// Internal segmentation resolution tier: low, medium, high
    #[arg(long, default_value = "medium")]
    resolution: String,

    /// Foreground confidence threshold
    #[arg(long, default_value_t = 0.7)]
    threshold: f32,

    /// Countdown seconds before the automatic capture
    #[arg(long, default_value_t = 10)]
    countdown: u32,

    /// Honor a manual capture while the countdown is running
    #[arg(long)]
    allow_manual_capture: bool,

    /// Where to write the captured image
    #[arg(short, long, default_value = "capture.jpg")]
    output: PathBuf,

    /// Export as PNG instead of JPEG
    #[arg(long)]
    png: bool,

    /// JPEG quality
    #[arg(long, default_value_t = 92)]
    quality: u8,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Artbooth starting");
    tracing::info!("Output: {}x{} @ {} fps", args.width, args.height, args.fps);
    tracing::info!("Countdown: {}s", args.countdown);

    let resolution = match args.resolution.as_str() {
        "low" => ResolutionTier::Low,
        "high" => ResolutionTier::High,
        _ => ResolutionTier::Medium,
    };

    let config = SessionConfig {
        output_width: args.width,
        output_height: args.height,
        camera_index: args.camera_index,
        target_fps: args.fps,
        countdown_start: args.countdown,
        background_ref: args.background.clone(),
        assets_dir: args.assets_dir.clone(),
        segmentation: SegmentationConfig {
            resolution,
            confidence_threshold: args.threshold,
            ..SegmentationConfig::default()
        },
        model_path: args.model.clone(),
        snapshot_format: if args.png {
            SnapshotFormat::Png
        } else {
            SnapshotFormat::Jpeg
        },
        snapshot_quality: args.quality,
        capture_policy: CapturePolicy {
            manual_during_countdown: args.allow_manual_capture,
        },
        ..SessionConfig::default()
    };

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let cancel = CancelToken::new();

    // The session loop runs on a worker thread; this thread stands in for
    // the display/upload collaborators and just consumes events.
    let worker_config = config.clone();
    let worker = thread::spawn(move || {
        let mut session = ShootSession::new(&worker_config, event_tx, None, cancel);
        session.start(|token| session::bootstrap(&worker_config, token));
        session.run();
    });

    let mut captured: Option<EncodedImage> = None;
    let mut failure: Option<String> = None;

    for event in event_rx {
        match event {
            SessionEvent::Ready => tracing::info!("Session ready"),
            SessionEvent::CountdownTick(n) => tracing::info!("Countdown: {}", n),
            SessionEvent::Captured(image) => {
                tracing::info!("Captured {} bytes ({})", image.bytes.len(), image.media_type);
                captured = Some(image);
            }
            SessionEvent::Failed { message, severity } => match severity {
                // The benign class is logged, never surfaced as a failure.
                Severity::Benign => tracing::debug!("Suppressed benign failure: {}", message),
                Severity::Error => {
                    tracing::error!("Session failed: {}", message);
                    failure = Some(message);
                }
            },
            SessionEvent::Cancelled => tracing::info!("Session cancelled"),
        }
    }

    if worker.join().is_err() {
        anyhow::bail!("session thread panicked");
    }

    if let Some(image) = captured {
        fs::write(&args.output, &image.bytes)
            .with_context(|| format!("Failed to write capture to {}", args.output.display()))?;
        tracing::info!("Capture written to {}", args.output.display());
    } else if let Some(message) = failure {
        anyhow::bail!("shoot session failed: {message}");
    }

    Ok(())
}
