use std::path::PathBuf;
use std::time::Duration;

use crate::export::SnapshotFormat;
use crate::segmentation::SegmentationConfig;

/// Everything a shoot session needs, fixed at construction. Components never
/// read ambient state; the navigation layer builds one of these per session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed output resolution for the whole session. Camera frames are
    /// resampled to this, never renegotiated.
    pub output_width: u32,
    pub output_height: u32,

    /// Camera device index.
    pub camera_index: u32,

    /// Target composite refresh rate.
    pub target_fps: u32,

    /// Countdown start value in ticks.
    pub countdown_start: u32,

    /// Length of one countdown tick.
    pub tick_interval: Duration,

    /// Selected artwork reference (path, URL, or data URI). Absent means
    /// the fallback fill is used for the whole session.
    pub background_ref: Option<String>,

    /// Directory that relative background references resolve against.
    pub assets_dir: PathBuf,

    /// Timeout for fetching a remote background reference.
    pub http_timeout: Duration,

    pub segmentation: SegmentationConfig,
    pub model_path: PathBuf,

    pub snapshot_format: SnapshotFormat,
    pub snapshot_quality: u8,

    pub capture_policy: CapturePolicy,
}

/// Policy for the manual capture trigger.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapturePolicy {
    /// Honor a manual "capture now" while the countdown is still running.
    pub manual_during_countdown: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_width: 1080,
            output_height: 1920,
            camera_index: 0,
            target_fps: 30,
            countdown_start: 10,
            tick_interval: Duration::from_secs(1),
            background_ref: None,
            assets_dir: PathBuf::from("."),
            http_timeout: Duration::from_secs(10),
            segmentation: SegmentationConfig::default(),
            model_path: PathBuf::from("models/portrait_matting.onnx"),
            snapshot_format: SnapshotFormat::Jpeg,
            snapshot_quality: 92,
            capture_policy: CapturePolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.target_fps.max(1) as f32)
    }
}
