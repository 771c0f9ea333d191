//! changemark-pipeline: Pure before/after change detection (sans-IO).
//!
//! Compares two photographs of the same scene and outlines what changed:
//! luminance -> absolute difference -> threshold -> dilation ->
//! region extraction -> area filter -> annotation.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images (or encoded byte slices) and returns structured data. Pair
//! discovery, file loading and writing results live in `changemark-io`.

pub mod annotate;
pub mod diagnostics;
pub mod difference;
pub mod dilate;
pub mod grayscale;
pub mod pipeline;
pub mod regions;
pub mod types;

pub use pipeline::{Pipeline, StagedResult};
pub use regions::{Connectivity, RegionExtractor, RegionExtractorKind};
pub use types::{
    BoundingBox, ChangeReport, DetectionConfig, Dimensions, GrayImage, PipelineError, RgbImage,
};

/// Run the full change detection pipeline on one image pair.
///
/// Returns the annotated copy of `after` together with the boxes drawn
/// on it. Neither input is modified.
///
/// # Pipeline steps
///
/// 1. Validate that both images share the same dimensions
/// 2. Convert both to luminance
/// 3. Absolute difference, thresholded into a binary mask
/// 4. Square dilation to merge fragments of one change
/// 5. Region extraction (pluggable strategy) and minimum-area filter
/// 6. Red outline for every retained box on a copy of `after`
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `config` fails
/// validation.
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// width or height.
pub fn detect_changes(
    before: &RgbImage,
    after: &RgbImage,
    config: &DetectionConfig,
) -> Result<ChangeReport, PipelineError> {
    config.validate()?;
    Ok(Pipeline::new(before.clone(), after.clone(), config.clone())?
        .normalize()
        .build_mask()
        .clean_mask()
        .extract_regions()
        .annotate()
        .into_report())
}

/// Run the full pipeline on one pair and keep every intermediate raster.
///
/// # Errors
///
/// Same as [`detect_changes`].
pub fn detect_changes_staged(
    before: &RgbImage,
    after: &RgbImage,
    config: &DetectionConfig,
) -> Result<StagedResult, PipelineError> {
    config.validate()?;
    Ok(Pipeline::new(before.clone(), after.clone(), config.clone())?
        .normalize()
        .build_mask()
        .clean_mask()
        .extract_regions()
        .annotate()
        .into_staged())
}

/// Decode two encoded images and run [`detect_changes`] on them.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or [`PipelineError::ImageDecode`]
/// if either buffer cannot be decoded, plus everything
/// [`detect_changes`] can return.
pub fn detect_changes_from_bytes(
    before: &[u8],
    after: &[u8],
    config: &DetectionConfig,
) -> Result<ChangeReport, PipelineError> {
    config.validate()?;
    Ok(Pipeline::from_bytes(before, after, config.clone())?
        .normalize()
        .build_mask()
        .clean_mask()
        .extract_regions()
        .annotate()
        .into_report())
}
