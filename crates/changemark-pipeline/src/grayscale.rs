//! Image decoding and luminance normalization.
//!
//! Decoding accepts raw image bytes (PNG, JPEG, BMP, WebP) and always
//! yields an 8-bit RGB image, whatever the source layout. Normalization
//! reduces that RGB image to a single intensity channel.
//!
//! This is the first step in the pipeline: color in, `GrayImage` out.

use image::{GrayImage, Luma, RgbImage};

use crate::types::PipelineError;

/// Fixed-point precision of the luminance weights.
const LUMA_SHIFT: u32 = 14;

/// BT.601 weights scaled by `2^LUMA_SHIFT`; they sum to exactly `1 << 14`.
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;

/// Decode raw image bytes into an 8-bit RGB image.
///
/// Grayscale, alpha, and 16-bit sources are converted to 8-bit RGB so
/// every downstream stage sees three color channels.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Luminance of one RGB pixel: `0.299*R + 0.587*G + 0.114*B`, rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn luminance([r, g, b]: [u8; 3]) -> u8 {
    let weighted = r as u32 * WEIGHT_R + g as u32 * WEIGHT_G + b as u32 * WEIGHT_B;
    // Max is 255 << 14 plus the rounding term, which still shifts down to 255.
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Convert an RGB image to a single-channel luminance image of the same
/// dimensions. The input is not modified.
#[must_use = "returns the luminance image"]
pub fn normalize(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (Luma([out]), rgb) in gray.pixels_mut().zip(image.pixels()) {
        *out = luminance(rgb.0);
    }
    gray
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGBA buffer as PNG bytes.
    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn weights_sum_to_unity() {
        assert_eq!(WEIGHT_R + WEIGHT_G + WEIGHT_B, 1 << LUMA_SHIFT);
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode_rgb(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_rgb(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn rgba_png_decodes_to_rgb() {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 128]));
        let rgb = decode_rgb(&encode_png(&img)).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn extremes_map_to_extremes() {
        assert_eq!(luminance([0, 0, 0]), 0);
        assert_eq!(luminance([255, 255, 255]), 255);
    }

    #[test]
    fn neutral_gray_is_preserved() {
        for v in [1_u8, 50, 128, 200, 254] {
            assert_eq!(luminance([v, v, v]), v);
        }
    }

    #[test]
    fn primaries_use_bt601_weights() {
        assert_eq!(luminance([255, 0, 0]), 76);
        assert_eq!(luminance([0, 255, 0]), 150);
        assert_eq!(luminance([0, 0, 255]), 29);
    }

    #[test]
    fn normalize_preserves_dimensions() {
        let img = RgbImage::from_pixel(17, 31, image::Rgb([128, 64, 32]));
        let gray = normalize(&img);
        assert_eq!(gray.dimensions(), (17, 31));
    }

    #[test]
    fn normalize_does_not_touch_input() {
        let img = RgbImage::from_fn(4, 4, |x, y| image::Rgb([x as u8 * 40, y as u8 * 40, 7]));
        let before = img.clone();
        let _gray = normalize(&img);
        assert_eq!(img, before);
    }

    #[test]
    fn normalize_is_per_pixel() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        let gray = normalize(&img);
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
    }
}
