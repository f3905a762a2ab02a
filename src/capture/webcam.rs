use super::CaptureSource;
use image::{imageops, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

use crate::error::DeviceError;

/// Webcam capture via nokhwa.
///
/// The handle is dropped on `release`, which turns the physical camera
/// indicator off; all later frame reads report an interrupted stream.
pub struct WebcamCapture {
    camera: Option<Camera>,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    /// Open the camera and start streaming.
    ///
    /// Requests the format closest to the target resolution; whatever the
    /// device actually negotiates, frames are resampled to `width`x`height`
    /// before leaving this source.
    pub fn acquire(device_index: u32, width: u32, height: u32) -> Result<Self, DeviceError> {
        tracing::info!(
            "Acquiring webcam {} targeting {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30),
        ));

        let mut camera = Camera::new(index, requested)
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        camera
            .open_stream()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let native = camera.resolution();
        tracing::info!(
            "Webcam streaming at native {}x{}",
            native.width(),
            native.height()
        );

        Ok(Self {
            camera: Some(camera),
            width,
            height,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn current_frame(&mut self) -> Result<RgbImage, DeviceError> {
        let camera = self.camera.as_mut().ok_or(DeviceError::Interrupted)?;

        let frame = camera
            .frame()
            .map_err(|e| DeviceError::Frame(e.to_string()))?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| DeviceError::Frame(e.to_string()))?;

        // Resample to the session's fixed resolution if the device
        // negotiated something else.
        if decoded.dimensions() == (self.width, self.height) {
            Ok(decoded)
        } else {
            Ok(imageops::resize(
                &decoded,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            ))
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::debug!("Error stopping camera stream on release: {}", e);
            }
            tracing::info!("Webcam released");
        }
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        self.release();
    }
}
