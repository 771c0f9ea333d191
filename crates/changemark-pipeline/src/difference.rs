//! Per-pixel absolute difference and binarization.
//!
//! Two luminance images of identical size are compared pixel by pixel.
//! The absolute difference is kept as an intermediate image, then
//! thresholded into a binary mask where changed pixels are
//! [`FOREGROUND`] and everything else is [`BACKGROUND`].

use image::{GrayImage, Luma};

use crate::types::{Dimensions, PipelineError};

/// Mask value for changed pixels.
pub const FOREGROUND: u8 = 255;

/// Mask value for unchanged pixels.
pub const BACKGROUND: u8 = 0;

/// Absolute intensity difference between two luminance images.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// width or height.
pub fn absolute_difference(
    before: &GrayImage,
    after: &GrayImage,
) -> Result<GrayImage, PipelineError> {
    ensure_same_dimensions(before, after)?;
    Ok(absolute_difference_unchecked(before, after))
}

/// Absolute difference of two images already known to share dimensions.
pub(crate) fn absolute_difference_unchecked(before: &GrayImage, after: &GrayImage) -> GrayImage {
    let mut diff = GrayImage::new(before.width(), before.height());
    for (Luma([out]), (Luma([a]), Luma([b]))) in
        diff.pixels_mut().zip(before.pixels().zip(after.pixels()))
    {
        *out = a.abs_diff(*b);
    }
    diff
}

/// Binarize a difference image: values strictly greater than `threshold`
/// become [`FOREGROUND`], all others [`BACKGROUND`].
#[must_use = "returns the binary mask"]
pub fn binarize(diff: &GrayImage, threshold: u8) -> GrayImage {
    let mut mask = GrayImage::new(diff.width(), diff.height());
    for (Luma([out]), Luma([d])) in mask.pixels_mut().zip(diff.pixels()) {
        *out = if *d > threshold { FOREGROUND } else { BACKGROUND };
    }
    mask
}

/// Difference followed by binarization in one call.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the images differ in
/// width or height.
pub fn difference_mask(
    before: &GrayImage,
    after: &GrayImage,
    threshold: u8,
) -> Result<GrayImage, PipelineError> {
    Ok(binarize(&absolute_difference(before, after)?, threshold))
}

/// Number of foreground pixels in a binary mask.
#[must_use]
pub fn foreground_count(mask: &GrayImage) -> u64 {
    mask.pixels()
        .map(|Luma([v])| u64::from(*v != BACKGROUND))
        .sum()
}

fn ensure_same_dimensions(before: &GrayImage, after: &GrayImage) -> Result<(), PipelineError> {
    if before.dimensions() == after.dimensions() {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            before: Dimensions::of(before),
            after: Dimensions::of(after),
        })
    }
}
