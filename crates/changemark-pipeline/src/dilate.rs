//! Noise suppression by morphological dilation.
//!
//! Every foreground pixel of the binary mask grows into a square
//! neighbourhood, repeated a configured number of times. Fragments of
//! one physical change merge into a single region; isolated noise pixels
//! grow too, but stay small enough for the area filter in
//! [`regions`](crate::regions) to drop them.

use image::GrayImage;
use imageproc::distance_transform::Norm;

/// Dilate `mask` with a `kernel_size x kernel_size` square, `iterations`
/// times.
///
/// Any non-zero pixel counts as foreground; the output only contains 0
/// and 255. `kernel_size` must be odd (checked by
/// [`DetectionConfig::validate`](crate::DetectionConfig::validate)); an
/// even size is treated as the next smaller odd size. Zero iterations
/// returns an unchanged copy.
#[must_use = "returns the dilated mask"]
pub fn dilate_square(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let radius = kernel_radius(kernel_size);
    if radius == 0 || iterations == 0 {
        return crate::difference::binarize(mask, 0);
    }

    // A square of side 2r+1 is the L-infinity ball of radius r.
    (0..iterations).fold(mask.clone(), |acc, _| {
        imageproc::morphology::dilate(&acc, Norm::LInf, radius)
    })
}

/// Chebyshev radius of an odd square kernel, saturated to `u8`.
fn kernel_radius(kernel_size: u32) -> u8 {
    u8::try_from(kernel_size / 2).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::difference::{FOREGROUND, foreground_count};

    fn single_pixel(width: u32, height: u32, x: u32, y: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        img.put_pixel(x, y, Luma([FOREGROUND]));
        img
    }

    #[test]
    fn radius_from_kernel_size() {
        assert_eq!(kernel_radius(1), 0);
        assert_eq!(kernel_radius(3), 1);
        assert_eq!(kernel_radius(5), 2);
        assert_eq!(kernel_radius(10_001), u8::MAX);
    }

    #[test]
    fn single_pixel_grows_into_square() {
        let mask = single_pixel(21, 21, 10, 10);
        let dilated = dilate_square(&mask, 5, 1);
        assert_eq!(foreground_count(&dilated), 25);
        assert_eq!(dilated.get_pixel(8, 8).0[0], FOREGROUND);
        assert_eq!(dilated.get_pixel(12, 12).0[0], FOREGROUND);
        assert_eq!(dilated.get_pixel(7, 10).0[0], 0);
    }

    #[test]
    fn iterations_compound() {
        let mask = single_pixel(21, 21, 10, 10);
        let dilated = dilate_square(&mask, 5, 2);
        // Two 5x5 passes reach four pixels in every direction: 9x9.
        assert_eq!(foreground_count(&dilated), 81);
    }

    #[test]
    fn dilation_is_clipped_at_border() {
        let mask = single_pixel(10, 10, 0, 0);
        let dilated = dilate_square(&mask, 5, 1);
        assert_eq!(dilated.dimensions(), (10, 10));
        assert_eq!(foreground_count(&dilated), 9);
    }

    #[test]
    fn zero_iterations_is_identity() {
        let mask = single_pixel(5, 5, 2, 2);
        assert_eq!(dilate_square(&mask, 5, 0), mask);
    }

    #[test]
    fn unit_kernel_is_identity() {
        let mask = single_pixel(5, 5, 1, 3);
        assert_eq!(dilate_square(&mask, 1, 3), mask);
    }

    #[test]
    fn empty_mask_stays_empty() {
        let mask = GrayImage::new(16, 16);
        assert_eq!(foreground_count(&dilate_square(&mask, 5, 2)), 0);
    }

    #[test]
    fn nearby_fragments_merge() {
        let mut mask = GrayImage::new(30, 10);
        mask.put_pixel(10, 5, Luma([FOREGROUND]));
        mask.put_pixel(16, 5, Luma([FOREGROUND]));
        let dilated = dilate_square(&mask, 5, 2);
        // The gap between the two pixels is fully bridged.
        for x in 10..=16 {
            assert_eq!(dilated.get_pixel(x, 5).0[0], FOREGROUND);
        }
    }

    #[test]
    fn input_mask_is_not_modified() {
        let mask = single_pixel(9, 9, 4, 4);
        let copy = mask.clone();
        let _ = dilate_square(&mask, 3, 2);
        assert_eq!(mask, copy);
    }
}
