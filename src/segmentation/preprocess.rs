use anyhow::Result;
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Converts RGB frames to model input tensors and model output mattes back
/// to frame-resolution mattes.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGB image into a normalized NCHW tensor.
    ///
    /// Steps:
    /// 1. Resize to the internal processing resolution
    /// 2. Normalize channels to [-1, 1] (matting-model convention)
    /// 3. Transpose from HWC to NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for y in 0..height {
            for x in 0..width {
                let pixel = resized.get_pixel(x, y);

                // Normalize to [-1, 1]
                let r = pixel[0] as f32 / 127.5 - 1.0;
                let g = pixel[1] as f32 / 127.5 - 1.0;
                let b = pixel[2] as f32 / 127.5 - 1.0;

                tensor[[0, 0, y as usize, x as usize]] = r;
                tensor[[0, 1, y as usize, x as usize]] = g;
                tensor[[0, 2, y as usize, x as usize]] = b;
            }
        }

        Ok(tensor)
    }

    /// Resize a model-resolution matte back to frame dimensions.
    ///
    /// Returns: matte flattened in row-major order at `target_width` x
    /// `target_height`.
    pub fn postprocess_matte(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Vec<f32>> {
        let _span = tracing::debug_span!("postprocess").entered();

        if matte_width == target_width && matte_height == target_height {
            return Ok(matte.to_vec());
        }

        // Resize through a grayscale image
        let gray_image = image::GrayImage::from_fn(matte_width, matte_height, |x, y| {
            let idx = (y * matte_width + x) as usize;
            let value = (matte[idx] * 255.0).clamp(0.0, 255.0) as u8;
            image::Luma([value])
        });

        let resized = imageops::resize(
            &gray_image,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        let output: Vec<f32> = resized.pixels().map(|p| p[0] as f32 / 255.0).collect();

        Ok(output)
    }

    /// Binarize a matte in place: probability at or above `threshold`
    /// becomes 1.0, everything else 0.0.
    pub fn threshold_matte(matte: &mut [f32], threshold: f32) {
        for v in matte.iter_mut() {
            *v = if *v >= threshold { 1.0 } else { 0.0 };
        }
    }
}
