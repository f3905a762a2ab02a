//! The capture loop.
//!
//! Tick policy: segmentation is awaited inline, so ticks serialize; two
//! segmentation calls never run on the same model handle concurrently. A
//! tick that cannot complete (frame read or segmentation failure) is
//! skipped and the previous output frame stays published.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use super::{
    CancelToken, Countdown, CountdownEvent, SessionCommand, SessionEvent, SessionParts,
    SessionState, Severity,
};
use crate::capture::CaptureSource;
use crate::compositor::FrameCompositor;
use crate::config::{CapturePolicy, SessionConfig};
use crate::error::SessionError;
use crate::export::SnapshotExporter;
use crate::segmentation::SegmentationModel;

#[derive(Debug, Clone, Copy)]
enum TriggerOrigin {
    Countdown,
    Manual,
}

#[derive(Debug, Clone, Copy)]
enum StopCause {
    Captured,
    Cancelled,
    Failed,
}

#[derive(Default)]
struct TickStats {
    frames: u64,
    capture: Duration,
    segment: Duration,
    compose: Duration,
}

impl TickStats {
    fn maybe_log(&self) {
        if self.frames > 0 && self.frames % 120 == 0 {
            let avg_ms = |d: Duration| d.as_secs_f64() * 1000.0 / self.frames as f64;
            let total = avg_ms(self.capture) + avg_ms(self.segment) + avg_ms(self.compose);
            tracing::debug!(
                "Frame {}: capture={:.1}ms, segment={:.1}ms, compose={:.1}ms, fps={:.1}",
                self.frames,
                avg_ms(self.capture),
                avg_ms(self.segment),
                avg_ms(self.compose),
                1000.0 / total.max(0.001)
            );
        }
    }
}

/// One shoot session: camera in, composited frames out, at most one
/// captured still.
///
/// State machine: `Idle → Initializing → Running → Stopped`. `Stopped` is
/// terminal for the session; a retry means building a new session.
pub struct ShootSession<C: CaptureSource, M: SegmentationModel> {
    state: SessionState,
    capture: Option<C>,
    model: Option<M>,
    compositor: FrameCompositor,
    countdown: Countdown,
    exporter: SnapshotExporter,
    policy: CapturePolicy,
    frame_duration: Duration,
    events: Sender<SessionEvent>,
    commands: Option<Receiver<SessionCommand>>,
    cancel: CancelToken,
    captured: bool,
    released: bool,
}

impl<C: CaptureSource, M: SegmentationModel> ShootSession<C, M> {
    pub fn new(
        config: &SessionConfig,
        events: Sender<SessionEvent>,
        commands: Option<Receiver<SessionCommand>>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            capture: None,
            model: None,
            compositor: FrameCompositor::new(config.output_width, config.output_height),
            countdown: Countdown::new(config.countdown_start, config.tick_interval),
            exporter: SnapshotExporter::new(config.snapshot_format, config.snapshot_quality),
            policy: config.capture_policy,
            frame_duration: config.frame_duration(),
            events,
            commands,
            cancel,
            captured: false,
            released: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run initialization and arm the session.
    ///
    /// The initializer produces the camera, model, and background parts
    /// (`session::bootstrap` in production, fakes in tests). `Ok(None)`
    /// means initialization was cancelled: the session stops without
    /// surfacing a failure. Any error is terminal and surfaced exactly
    /// once.
    pub fn start<F>(&mut self, init: F) -> SessionState
    where
        F: FnOnce(&CancelToken) -> Result<Option<SessionParts<C, M>>, SessionError>,
    {
        if self.state != SessionState::Idle {
            return self.state;
        }
        self.state = SessionState::Initializing;
        tracing::info!("Session initializing");

        match init(&self.cancel) {
            Ok(Some(parts)) => {
                if self.cancel.is_cancelled() {
                    self.capture = Some(parts.capture);
                    self.finish(StopCause::Cancelled);
                    return self.state;
                }

                self.compositor.set_background(parts.background.as_ref());
                self.capture = Some(parts.capture);
                self.model = Some(parts.model);
                self.state = SessionState::Running;
                self.countdown.start(Instant::now());

                let _ = self.events.send(SessionEvent::Ready);
                let _ = self
                    .events
                    .send(SessionEvent::CountdownTick(self.countdown.ticks_remaining()));

                tracing::info!(
                    "Session running, countdown from {}",
                    self.countdown.ticks_remaining()
                );
            }
            Ok(None) => {
                tracing::info!("Session cancelled during initialization");
                self.finish(StopCause::Cancelled);
            }
            Err(err) => {
                if err.is_benign() && self.cancel.is_cancelled() {
                    // Interruption caused by the cancellation itself; not a
                    // failure.
                    tracing::debug!("Initialization interrupted by cancellation: {}", err);
                    self.finish(StopCause::Cancelled);
                } else {
                    tracing::error!("Session initialization failed: {}", err);
                    let severity = if err.is_benign() {
                        Severity::Benign
                    } else {
                        Severity::Error
                    };
                    let _ = self.events.send(SessionEvent::Failed {
                        message: err.to_string(),
                        severity,
                    });
                    self.finish(StopCause::Failed);
                }
            }
        }

        self.state
    }

    /// Drive the loop until the session stops.
    ///
    /// Each tick: read the current camera frame, await segmentation,
    /// compose, then let the countdown and any manual trigger observe the
    /// newly composed frame, then pace to the configured refresh rate.
    pub fn run(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        tracing::info!("Capture loop running");

        let mut consecutive_failures = 0u32;
        let mut stats = TickStats::default();

        while self.state == SessionState::Running {
            let tick_start = Instant::now();

            if self.cancel.is_cancelled() {
                self.finish(StopCause::Cancelled);
                break;
            }

            match self.tick(&mut stats) {
                Ok(()) => consecutive_failures = 0,
                Err((message, severity)) => {
                    consecutive_failures += 1;
                    if severity == Severity::Benign {
                        tracing::debug!("Tick skipped: {}", message);
                    } else {
                        tracing::warn!("Tick failed: {}", message);
                    }

                    // One transient failure skips the tick; a second in a
                    // row is terminal.
                    if consecutive_failures > 1 {
                        if severity == Severity::Benign && self.cancel.is_cancelled() {
                            self.finish(StopCause::Cancelled);
                        } else {
                            let _ = self.events.send(SessionEvent::Failed { message, severity });
                            self.finish(StopCause::Failed);
                        }
                        break;
                    }
                }
            }

            // Countdown and triggers observe the frame just composed.
            match self.countdown.poll(Instant::now()) {
                CountdownEvent::Tick(n) => {
                    let _ = self.events.send(SessionEvent::CountdownTick(n));
                }
                CountdownEvent::Finished => {
                    let _ = self.events.send(SessionEvent::CountdownTick(0));
                    self.capture_now(TriggerOrigin::Countdown);
                }
                CountdownEvent::Idle => {}
            }
            if self.state != SessionState::Running {
                break;
            }

            let pending: Vec<SessionCommand> = match &self.commands {
                Some(receiver) => receiver.try_iter().collect(),
                None => Vec::new(),
            };
            for command in pending {
                match command {
                    SessionCommand::CaptureNow => self.capture_now(TriggerOrigin::Manual),
                }
            }
            if self.state != SessionState::Running {
                break;
            }

            stats.maybe_log();

            let elapsed = tick_start.elapsed();
            if elapsed < self.frame_duration {
                std::thread::sleep(self.frame_duration - elapsed);
            }
        }

        // Whatever ended the loop, leave nothing running.
        self.finish(StopCause::Cancelled);
    }

    /// Explicit cancellation path (user backs out). Idempotent.
    pub fn stop(&mut self) {
        self.finish(StopCause::Cancelled);
    }

    fn tick(&mut self, stats: &mut TickStats) -> Result<(), (String, Severity)> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| ("camera handle missing".to_owned(), Severity::Error))?;

        let capture_start = Instant::now();
        let frame = capture.current_frame().map_err(|e| {
            let severity = if e.is_benign() {
                Severity::Benign
            } else {
                Severity::Error
            };
            (e.to_string(), severity)
        })?;
        stats.capture += capture_start.elapsed();

        let model = self
            .model
            .as_mut()
            .ok_or_else(|| ("segmentation model missing".to_owned(), Severity::Error))?;

        let segment_start = Instant::now();
        let matte = model
            .segment(&frame)
            .map_err(|e| (format!("segmentation failed: {e}"), Severity::Error))?;
        stats.segment += segment_start.elapsed();

        let compose_start = Instant::now();
        self.compositor.compose(&frame, &matte);
        stats.compose += compose_start.elapsed();
        stats.frames += 1;

        Ok(())
    }

    /// The single "capture now" funnel for both the countdown trigger and
    /// the manual trigger. Executes at most once per session; later calls
    /// are no-ops.
    fn capture_now(&mut self, origin: TriggerOrigin) {
        if self.captured {
            tracing::debug!("Capture already taken this session; ignoring trigger");
            return;
        }
        if matches!(origin, TriggerOrigin::Manual)
            && self.countdown.is_active()
            && !self.policy.manual_during_countdown
        {
            tracing::debug!("Manual capture ignored while the countdown is pending");
            return;
        }

        match self.exporter.export(&self.compositor) {
            Ok(image) => {
                self.captured = true;
                tracing::info!(
                    "Captured still ({:?} trigger, {} bytes)",
                    origin,
                    image.bytes.len()
                );
                let _ = self.events.send(SessionEvent::Captured(image));
                self.finish(StopCause::Captured);
            }
            Err(err) => {
                tracing::error!("Capture failed: {}", err);
                let _ = self.events.send(SessionEvent::Failed {
                    message: err.to_string(),
                    severity: Severity::Error,
                });
                self.finish(StopCause::Failed);
            }
        }
    }

    /// Tear the session down. Runs at most once; the camera is released on
    /// exactly one path no matter what caused the stop.
    fn finish(&mut self, cause: StopCause) {
        if self.state == SessionState::Stopped {
            return;
        }

        self.release_camera();
        self.countdown.cancel();
        self.model = None;
        self.state = SessionState::Stopped;

        if matches!(cause, StopCause::Cancelled) {
            let _ = self.events.send(SessionEvent::Cancelled);
        }

        tracing::info!("Session stopped: {:?}", cause);
    }

    fn release_camera(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
    }
}
