mod portrait;
mod preprocess;
mod refine;
pub mod types;

pub use portrait::PortraitMatting;
pub use preprocess::Preprocessor;
pub use types::{Matte, ResolutionTier, SegmentationConfig, SegmentationModel};

use std::path::Path;

use crate::error::ModelLoadError;

/// Create the default segmentation model (portrait matting).
pub fn create_default_model<P: AsRef<Path>>(
    model_path: P,
    config: SegmentationConfig,
) -> Result<Box<dyn SegmentationModel>, ModelLoadError> {
    let model = PortraitMatting::load(model_path, config)?;
    Ok(Box::new(model))
}
