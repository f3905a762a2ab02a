use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};

use crate::compositor::FrameCompositor;
use crate::error::ExportError;

/// Encoding for the captured still.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Jpeg,
    Png,
}

impl SnapshotFormat {
    pub fn media_type(self) -> &'static str {
        match self {
            SnapshotFormat::Jpeg => "image/jpeg",
            SnapshotFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Jpeg => "jpg",
            SnapshotFormat::Png => "png",
        }
    }
}

/// An immutable encoded snapshot. Produced at most once per shoot session;
/// ownership passes to the downstream consumer on export.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

/// Serializes the current composed frame to a portable encoded image.
///
/// Pure and synchronous given a ready frame; performs no I/O.
pub struct SnapshotExporter {
    format: SnapshotFormat,
    quality: u8,
}

impl SnapshotExporter {
    pub fn new(format: SnapshotFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.min(100),
        }
    }

    /// Encode the compositor's current output frame.
    ///
    /// Fails only when no frame was ever composed (the loop never reached
    /// its running state).
    pub fn export(&self, compositor: &FrameCompositor) -> Result<EncodedImage, ExportError> {
        if !compositor.has_frame() {
            return Err(ExportError::FrameNotReady);
        }
        self.encode(compositor.output())
    }

    fn encode(&self, frame: &RgbaImage) -> Result<EncodedImage, ExportError> {
        let mut bytes = Vec::new();

        match self.format {
            SnapshotFormat::Jpeg => {
                // JPEG has no alpha; the composed frame is fully opaque.
                let rgb = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
                    let p = frame.get_pixel(x, y);
                    Rgb([p[0], p[1], p[2]])
                });
                JpegEncoder::new_with_quality(&mut bytes, self.quality)
                    .encode_image(&rgb)
                    .map_err(|e| ExportError::Encode(e.to_string()))?;
            }
            SnapshotFormat::Png => {
                image::DynamicImage::ImageRgba8(frame.clone())
                    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                    .map_err(|e| ExportError::Encode(e.to_string()))?;
            }
        }

        tracing::info!(
            "Snapshot exported: {} bytes, {}",
            bytes.len(),
            self.format.media_type()
        );

        Ok(EncodedImage {
            bytes,
            media_type: self.format.media_type(),
        })
    }
}
