use anyhow::Result;
use image::RgbImage;

/// Foreground matte: one value per frame pixel in row-major order,
/// 0.0 = background, 1.0 = subject. Binary after thresholding.
/// Dimensions match the input frame dimensions.
pub type Matte = Vec<f32>;

/// Internal processing resolution tier. Higher tiers trade speed for
/// mask quality; the matte is resized back to frame resolution either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Low,
    Medium,
    High,
}

impl ResolutionTier {
    /// Side length of the square model input for this tier.
    pub fn internal_size(self) -> u32 {
        match self {
            ResolutionTier::Low => 256,
            ResolutionTier::Medium => 512,
            ResolutionTier::High => 736,
        }
    }
}

/// Externally fixed segmentation knobs. None of these are derived at
/// runtime; the session passes one of these in at construction.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationConfig {
    pub resolution: ResolutionTier,

    /// Foreground probability at or above this classifies as subject.
    pub confidence_threshold: f32,

    /// Maximum simultaneous subjects kept in the matte.
    pub max_subjects: usize,

    /// Foreground regions whose bounding box lies within this many
    /// internal-resolution pixels of the primary region are merged into it
    /// instead of suppressed.
    pub nms_radius: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            resolution: ResolutionTier::Medium,
            confidence_threshold: 0.7,
            max_subjects: 1,
            nms_radius: 20,
        }
    }
}

/// Trait for person-segmentation models.
///
/// Allows swapping between backends without touching the session loop.
pub trait SegmentationModel {
    /// Classify one frame into a foreground matte.
    ///
    /// Slow (tens of milliseconds); the capture loop treats this call as
    /// its per-tick suspension point. Output may vary slightly between
    /// identical frames; no frame-to-frame stability is promised.
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte>;

    /// The model's internal input dimensions, (width, height).
    fn input_size(&self) -> (u32, u32);
}

impl<T: SegmentationModel + ?Sized> SegmentationModel for Box<T> {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        (**self).segment(frame)
    }

    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }
}
