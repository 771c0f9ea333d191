//! Draw bounding boxes onto a copy of the "after" image.

use image::{Rgb, RgbImage};
use imageproc::rect::Rect;

use crate::types::BoundingBox;

/// Outline color for changed regions.
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline thickness in pixels.
pub const STROKE_WIDTH: u32 = 2;

/// Return a copy of `image` with every box outlined in [`BOX_COLOR`].
///
/// The stroke grows inward from the box edge, so the outline never
/// covers a pixel outside its box. Boxes are drawn in order; later
/// boxes paint over earlier ones where they overlap. Boxes reaching
/// outside the image are clipped by the drawing routine.
#[must_use = "returns the annotated copy"]
pub fn annotate(image: &RgbImage, boxes: &[BoundingBox]) -> RgbImage {
    let mut canvas = image.clone();
    for bbox in boxes {
        draw_outline(&mut canvas, bbox, BOX_COLOR, STROKE_WIDTH);
    }
    canvas
}

/// Draw `stroke` nested one-pixel hollow rectangles, outermost first.
#[allow(clippy::cast_possible_wrap)]
fn draw_outline(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, stroke: u32) {
    for inset in 0..stroke {
        let Some(width) = bbox.width.checked_sub(2 * inset).filter(|w| *w > 0) else {
            break;
        };
        let Some(height) = bbox.height.checked_sub(2 * inset).filter(|h| *h > 0) else {
            break;
        };
        let rect =
            Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32).of_size(width, height);
        imageproc::drawing::draw_hollow_rect_mut(canvas, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

    fn is_outline_pixel(bbox: &BoundingBox, x: u32, y: u32) -> bool {
        bbox.contains(x, y)
            && (x < bbox.x + STROKE_WIDTH
                || y < bbox.y + STROKE_WIDTH
                || x >= bbox.right() - STROKE_WIDTH
                || y >= bbox.bottom() - STROKE_WIDTH)
    }

    #[test]
    fn no_boxes_returns_identical_copy() {
        let img = RgbImage::from_pixel(10, 10, GRAY);
        assert_eq!(annotate(&img, &[]), img);
    }

    #[test]
    fn input_is_not_mutated() {
        let img = RgbImage::from_pixel(20, 20, GRAY);
        let copy = img.clone();
        let _ = annotate(&img, &[BoundingBox::new(2, 2, 10, 10)]);
        assert_eq!(img, copy);
    }

    #[test]
    fn outline_is_two_pixels_and_interior_untouched() {
        let img = RgbImage::from_pixel(30, 30, GRAY);
        let bbox = BoundingBox::new(5, 6, 12, 9);
        let out = annotate(&img, &[bbox]);
        for (x, y, px) in out.enumerate_pixels() {
            if is_outline_pixel(&bbox, x, y) {
                assert_eq!(*px, BOX_COLOR, "expected outline at ({x}, {y})");
            } else {
                assert_eq!(*px, GRAY, "unexpected change at ({x}, {y})");
            }
        }
    }

    #[test]
    fn box_on_image_border_stays_inside() {
        let img = RgbImage::from_pixel(10, 10, GRAY);
        let bbox = BoundingBox::new(0, 0, 10, 10);
        let out = annotate(&img, &[bbox]);
        assert_eq!(*out.get_pixel(0, 0), BOX_COLOR);
        assert_eq!(*out.get_pixel(9, 9), BOX_COLOR);
        assert_eq!(*out.get_pixel(8, 8), BOX_COLOR);
        assert_eq!(*out.get_pixel(5, 5), GRAY);
    }

    #[test]
    fn thin_box_is_fully_painted() {
        let img = RgbImage::from_pixel(10, 10, GRAY);
        let bbox = BoundingBox::new(2, 2, 1, 5);
        let out = annotate(&img, &[bbox]);
        for y in 2..7 {
            assert_eq!(*out.get_pixel(2, y), BOX_COLOR);
        }
        assert_eq!(*out.get_pixel(3, 4), GRAY);
    }

    #[test]
    fn overlapping_boxes_both_drawn() {
        let img = RgbImage::from_pixel(40, 40, GRAY);
        let a = BoundingBox::new(5, 5, 20, 20);
        let b = BoundingBox::new(15, 15, 20, 20);
        let out = annotate(&img, &[a, b]);
        assert_eq!(*out.get_pixel(5, 5), BOX_COLOR);
        assert_eq!(*out.get_pixel(34, 34), BOX_COLOR);
        assert_eq!(*out.get_pixel(10, 10), GRAY);
    }
}
