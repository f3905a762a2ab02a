use image::{imageops, RgbImage, Rgba, RgbaImage};

use crate::segmentation::Matte;

/// Neutral fill used when no artwork background is available.
const FALLBACK_FILL: Rgba<u8> = Rgba([221, 221, 221, 255]);

/// Combines the live camera frame, the foreground matte, and the artwork
/// background into one output frame.
///
/// All buffers are sized once at construction and mutated in place every
/// tick; nothing is reallocated per frame. The published output frame is
/// only ever written here.
pub struct FrameCompositor {
    width: u32,
    height: u32,

    /// Subject-only scratch layer: camera pixels with the matte applied as
    /// destination alpha. Reused every tick.
    subject: RgbaImage,

    /// The published composed frame. Retains its last content when a tick
    /// is skipped, so a dropped frame never flashes blank.
    output: RgbaImage,

    /// Background pre-fit to the output rectangle, computed once per art
    /// selection. `None` means fallback fill.
    fitted_background: Option<RgbaImage>,

    has_frame: bool,
}

impl FrameCompositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            subject: RgbaImage::new(width, height),
            output: RgbaImage::new(width, height),
            fitted_background: None,
            has_frame: false,
        }
    }

    /// Install the background for this session, cover-fit to the output
    /// rectangle. `None` selects the fallback fill.
    pub fn set_background(&mut self, background: Option<&RgbaImage>) {
        self.fitted_background = background.map(|bg| cover_fit(bg, self.width, self.height));
    }

    /// Compose one output frame.
    ///
    /// Layer order: cover-fit background (or fallback fill), then the
    /// masked subject on top, horizontally mirrored. The background is
    /// never mirrored; only the live subject is.
    ///
    /// Returns false without touching the output when the camera frame or
    /// matte does not match the output resolution.
    pub fn compose(&mut self, camera: &RgbImage, matte: &Matte) -> bool {
        if camera.dimensions() != (self.width, self.height)
            || matte.len() != (self.width * self.height) as usize
        {
            tracing::warn!(
                "Skipping composite: got frame {}x{} and matte of {} values, want {}x{}",
                camera.width(),
                camera.height(),
                matte.len(),
                self.width,
                self.height
            );
            return false;
        }

        // Subject layer: camera pixels kept where the matte is foreground,
        // transparent elsewhere.
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                let alpha = (matte[idx] * 255.0).clamp(0.0, 255.0) as u8;
                let p = camera.get_pixel(x, y);
                self.subject.put_pixel(x, y, Rgba([p[0], p[1], p[2], alpha]));
            }
        }

        // Background layer
        match &self.fitted_background {
            Some(bg) => imageops::replace(&mut self.output, bg, 0, 0),
            None => {
                for pixel in self.output.pixels_mut() {
                    *pixel = FALLBACK_FILL;
                }
            }
        }

        // Subject over background, flipped along the vertical axis
        for y in 0..self.height {
            for x in 0..self.width {
                let s = self.subject.get_pixel(self.width - 1 - x, y);
                let a = s[3] as u32;
                if a == 0 {
                    continue;
                }

                let d = self.output.get_pixel_mut(x, y);
                if a == 255 {
                    *d = Rgba([s[0], s[1], s[2], 255]);
                } else {
                    let na = 255 - a;
                    d[0] = ((s[0] as u32 * a + d[0] as u32 * na) / 255) as u8;
                    d[1] = ((s[1] as u32 * a + d[1] as u32 * na) / 255) as u8;
                    d[2] = ((s[2] as u32 * a + d[2] as u32 * na) / 255) as u8;
                    d[3] = 255;
                }
            }
        }

        self.has_frame = true;
        true
    }

    /// The published output frame. Only valid content once `has_frame`.
    pub fn output(&self) -> &RgbaImage {
        &self.output
    }

    /// Whether at least one frame has been composed this session.
    pub fn has_frame(&self) -> bool {
        self.has_frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Scale an image uniformly so it fully covers `width`x`height`, cropping
/// the overflow axis centered. Never stretched non-uniformly, never
/// letterboxed.
fn cover_fit(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (bw, bh) = image.dimensions();

    let canvas_ratio = width as f32 / height as f32;
    let image_ratio = bw as f32 / bh as f32;

    let (scaled_w, scaled_h) = if image_ratio > canvas_ratio {
        // Wider than the canvas: match height, crop width
        let w = (height as f32 * image_ratio).round() as u32;
        (w.max(width), height)
    } else {
        // Taller than (or matching) the canvas: match width, crop height
        let h = (width as f32 / image_ratio).round() as u32;
        (width, h.max(height))
    };

    let scaled = if (scaled_w, scaled_h) == (bw, bh) {
        image.clone()
    } else {
        imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Lanczos3)
    };

    let crop_x = (scaled_w - width) / 2;
    let crop_y = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, crop_x, crop_y, width, height).to_image()
}
