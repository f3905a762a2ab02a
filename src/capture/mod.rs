mod webcam;

pub use webcam::WebcamCapture;

use image::RgbImage;

use crate::error::DeviceError;

/// Trait for camera capture sources.
///
/// A source owns its hardware handle exclusively for the lifetime of one
/// shoot session and hands out frames already resampled to the session's
/// fixed output resolution.
pub trait CaptureSource {
    /// Return the most recent decoded frame at the target resolution.
    ///
    /// Callable many times per second without re-acquiring the device.
    fn current_frame(&mut self) -> Result<RgbImage, DeviceError>;

    /// The fixed target resolution frames are delivered at.
    fn resolution(&self) -> (u32, u32);

    /// Stop the underlying hardware stream.
    ///
    /// Idempotent, and safe to call even if acquisition failed partway.
    fn release(&mut self);
}
