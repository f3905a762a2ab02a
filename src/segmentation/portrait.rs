use super::preprocess::Preprocessor;
use super::refine;
use super::types::{Matte, SegmentationConfig, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::IxDyn;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

use crate::error::ModelLoadError;

/// Portrait matting segmentation model.
///
/// A stateless single-forward-pass matting network: every frame is
/// classified on its own, with no hidden state carried between frames.
pub struct PortraitMatting {
    session: Session,
    preprocessor: Preprocessor,
    config: SegmentationConfig,
    width: u32,
    height: u32,
}

impl PortraitMatting {
    /// Load a matting model from an ONNX file.
    ///
    /// The model is loaded once per shoot session and reused across ticks.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        config: SegmentationConfig,
    ) -> Result<Self, ModelLoadError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.display().to_string()));
        }

        tracing::info!("Loading portrait matting model from {}", path.display());

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| ModelLoadError::Init(e.to_string()))?;

        tracing::info!("Portrait matting model loaded successfully");

        let side = config.resolution.internal_size();
        let preprocessor = Preprocessor::new(side, side);

        Ok(Self {
            session,
            preprocessor,
            config,
            width: side,
            height: side,
        })
    }
}

impl SegmentationModel for PortraitMatting {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        let _span = tracing::debug_span!("portrait_segment").entered();

        // Preprocess frame to NCHW tensor at the internal tier
        let input_tensor = self.preprocessor.preprocess(frame)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input_tensor.view()]?)
            .context("Failed to run inference")?;
        drop(_infer_span);

        // Matting output: per-pixel foreground probability, shape [1, 1, H, W]
        let pha = outputs[0]
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned()
            .into_dimensionality::<IxDyn>()?;

        let matte_shape = pha.shape();
        let matte_height = matte_shape[2] as u32;
        let matte_width = matte_shape[3] as u32;

        let mut matte: Vec<f32> = pha.iter().copied().collect();

        // Classification and candidate resolution happen at the internal
        // resolution, where the NMS radius is defined.
        Preprocessor::threshold_matte(&mut matte, self.config.confidence_threshold);
        refine::resolve_subjects(
            &mut matte,
            matte_width,
            matte_height,
            self.config.max_subjects,
            self.config.nms_radius,
        );

        // Resize back to frame dimensions; interpolation softens the edges,
        // so re-binarize.
        let (frame_width, frame_height) = frame.dimensions();
        let mut final_matte = Preprocessor::postprocess_matte(
            &matte,
            matte_width,
            matte_height,
            frame_width,
            frame_height,
        )?;
        Preprocessor::threshold_matte(&mut final_matte, 0.5);

        Ok(final_matte)
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
