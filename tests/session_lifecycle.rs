//! End-to-end shoot session lifecycle over fake camera and model parts.
//!
//! Uses small synthetic frames and a fast countdown tick to keep the whole
//! run under a second.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::unbounded;
use image::{Rgb, RgbImage};

use artbooth::capture::CaptureSource;
use artbooth::config::SessionConfig;
use artbooth::error::DeviceError;
use artbooth::export::SnapshotFormat;
use artbooth::segmentation::{Matte, SegmentationModel};
use artbooth::session::{
    CancelToken, SessionCommand, SessionEvent, SessionParts, SessionState, ShootSession,
};

const W: u32 = 32;
const H: u32 = 32;

struct FakeCamera {
    releases: Arc<AtomicUsize>,
}

impl CaptureSource for FakeCamera {
    fn current_frame(&mut self) -> Result<RgbImage, DeviceError> {
        Ok(RgbImage::from_pixel(W, H, Rgb([120, 90, 60])))
    }

    fn resolution(&self) -> (u32, u32) {
        (W, H)
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Marks the center quarter of the frame as subject.
struct FakeSegmenter;

impl SegmentationModel for FakeSegmenter {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        let (w, h) = frame.dimensions();
        let mut matte = vec![0.0; (w * h) as usize];
        for y in h / 4..3 * h / 4 {
            for x in w / 4..3 * w / 4 {
                matte[(y * w + x) as usize] = 1.0;
            }
        }
        Ok(matte)
    }

    fn input_size(&self) -> (u32, u32) {
        (W, H)
    }
}

fn fast_config(countdown_start: u32) -> SessionConfig {
    SessionConfig {
        output_width: W,
        output_height: H,
        target_fps: 500,
        countdown_start,
        tick_interval: Duration::from_millis(10),
        background_ref: Some("art-42".to_owned()),
        snapshot_format: SnapshotFormat::Png,
        ..SessionConfig::default()
    }
}

fn fake_parts(releases: &Arc<AtomicUsize>) -> SessionParts<FakeCamera, FakeSegmenter> {
    SessionParts {
        capture: FakeCamera {
            releases: releases.clone(),
        },
        model: FakeSegmenter,
        background: None,
    }
}

#[test]
fn full_session_counts_down_captures_once_and_stops() {
    let (tx, rx) = unbounded();
    let releases = Arc::new(AtomicUsize::new(0));

    let mut session = ShootSession::new(&fast_config(10), tx, None, CancelToken::new());

    let state = session.start(|_| Ok(Some(fake_parts(&releases))));
    assert_eq!(state, SessionState::Running);

    session.run();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let events: Vec<SessionEvent> = rx.try_iter().collect();

    assert!(matches!(events.first(), Some(SessionEvent::Ready)));

    let captured: Vec<&SessionEvent> = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Captured(_)))
        .collect();
    assert_eq!(captured.len(), 1);

    if let SessionEvent::Captured(image) = captured[0] {
        assert_eq!(image.media_type, "image/png");
        assert!(!image.bytes.is_empty());
    }

    // Countdown ticked all the way down, in order.
    let ticks: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::CountdownTick(n) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(ticks.first(), Some(&10));
    assert_eq!(ticks.last(), Some(&0));
    assert!(ticks.windows(2).all(|w| w[0] > w[1]));

    // No failure, no cancellation on the happy path.
    assert!(events
        .iter()
        .all(|e| !matches!(e, SessionEvent::Failed { .. } | SessionEvent::Cancelled)));
}

#[test]
fn cancelling_before_init_completes_emits_no_capture_and_no_failure() {
    let (tx, rx) = unbounded();
    let cancel = CancelToken::new();

    let mut session =
        ShootSession::<FakeCamera, FakeSegmenter>::new(&fast_config(10), tx, None, cancel.clone());

    // The navigation layer backs out while initialization is in flight;
    // the stream interruption that causes is not a failure.
    let state = session.start(|token| {
        cancel.cancel();
        assert!(token.is_cancelled());
        Err(DeviceError::Interrupted.into())
    });
    assert_eq!(state, SessionState::Stopped);

    session.run();

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    assert!(events
        .iter()
        .all(|e| !matches!(e, SessionEvent::Captured(_) | SessionEvent::Failed { .. })));
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Cancelled)));
}

#[test]
fn capture_signals_after_the_capture_are_no_ops() {
    let (tx, rx) = unbounded();
    let (cmd_tx, cmd_rx) = unbounded();
    let releases = Arc::new(AtomicUsize::new(0));

    // Several manual triggers queued up at once; only one capture may come
    // out, the rest hit the already-captured guard.
    for _ in 0..5 {
        cmd_tx.send(SessionCommand::CaptureNow).unwrap();
    }

    let mut config = fast_config(1000);
    config.capture_policy.manual_during_countdown = true;

    let mut session = ShootSession::new(&config, tx, Some(cmd_rx), CancelToken::new());
    session.start(|_| Ok(Some(fake_parts(&releases))));
    session.run();

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    let captured = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Captured(_)))
        .count();
    assert_eq!(captured, 1);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn cancel_during_run_stops_without_capturing() {
    let (tx, rx) = unbounded();
    let releases = Arc::new(AtomicUsize::new(0));
    let cancel = CancelToken::new();

    let mut session = ShootSession::new(&fast_config(1000), tx, None, cancel.clone());
    session.start(|_| Ok(Some(fake_parts(&releases))));

    // Cancel from another thread while the loop runs.
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        cancel.cancel();
    });

    session.run();
    canceller.join().unwrap();

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Cancelled)));
    assert!(events
        .iter()
        .all(|e| !matches!(e, SessionEvent::Captured(_))));
}
