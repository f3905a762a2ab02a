mod countdown;
mod shoot;

pub use countdown::{Countdown, CountdownEvent};
pub use shoot::ShootSession;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;

use crate::background::BackgroundResolver;
use crate::capture::{CaptureSource, WebcamCapture};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::export::EncodedImage;
use crate::segmentation::{self, SegmentationModel};

/// Capture loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Running,
    Stopped,
}

/// How serious a surfaced failure is.
///
/// `Benign` marks the known class of camera interruptions caused by rapid
/// navigation; consumers log these instead of showing them as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Benign,
    Error,
}

/// Events emitted by a shoot session. The session never calls back into
/// the navigation layer; this channel is its only outbound surface.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Initialization finished, the loop is running.
    Ready,
    /// Countdown display value changed.
    CountdownTick(u32),
    /// The one captured still of this session.
    Captured(EncodedImage),
    /// Unrecoverable failure, surfaced once.
    Failed { message: String, severity: Severity },
    /// The session was cancelled before capturing.
    Cancelled,
}

/// Inbound control signals.
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    CaptureNow,
}

/// Cooperative cancellation flag, checked between initialization stages and
/// between ticks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything `Initializing` has to produce before the loop can run.
pub struct SessionParts<C: CaptureSource, M: SegmentationModel> {
    pub capture: C,
    pub model: M,
    pub background: Option<RgbaImage>,
}

/// Build the production session parts: acquire the camera, load the model,
/// resolve the background.
///
/// Checks the cancel token between stages; `Ok(None)` means the session was
/// cancelled mid-initialization and nothing should be surfaced as a failure.
/// Hardware already acquired is released before returning in that case.
pub fn bootstrap(
    config: &SessionConfig,
    cancel: &CancelToken,
) -> Result<Option<SessionParts<WebcamCapture, Box<dyn SegmentationModel>>>, SessionError> {
    if cancel.is_cancelled() {
        return Ok(None);
    }

    let mut capture = WebcamCapture::acquire(
        config.camera_index,
        config.output_width,
        config.output_height,
    )?;

    if cancel.is_cancelled() {
        capture.release();
        return Ok(None);
    }

    let model = segmentation::create_default_model(&config.model_path, config.segmentation)?;

    if cancel.is_cancelled() {
        capture.release();
        return Ok(None);
    }

    let mut resolver = BackgroundResolver::new(&config.assets_dir, config.http_timeout);
    let background = resolver.resolve(config.background_ref.as_deref()).cloned();

    Ok(Some(SessionParts {
        capture,
        model,
        background,
    }))
}
