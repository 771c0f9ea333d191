//! Region extraction: reduce a cleaned binary mask to bounding boxes.
//!
//! This module defines the [`RegionExtractor`] trait for pluggable
//! extraction strategies and the [`RegionExtractorKind`] enum for
//! selecting one at runtime.
//!
//! # Strategy pattern
//!
//! Both strategies report one box per region and never emit a box that
//! reaches outside the mask. They differ in how nested regions are
//! treated: connected-component labelling reports every component,
//! while outer border following only reports top-level outer borders,
//! so a component sitting inside the hole of another is covered by the
//! enclosing component's box.
//!
//! The minimum-area gate is applied afterwards by [`filter_by_area`],
//! independent of the strategy.

use image::{GrayImage, Luma};
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::difference::BACKGROUND;
use crate::types::{BoundingBox, DetectionConfig};

/// Pixel adjacency used when grouping foreground pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Edge-adjacent neighbours only.
    Four,
    /// Edge- and corner-adjacent neighbours.
    #[default]
    Eight,
}

impl From<Connectivity> for imageproc::region_labelling::Connectivity {
    fn from(c: Connectivity) -> Self {
        match c {
            Connectivity::Four => Self::Four,
            Connectivity::Eight => Self::Eight,
        }
    }
}

/// Selects which region extraction algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionExtractorKind {
    /// Connected-component labelling via
    /// `imageproc::region_labelling::connected_components`.
    ///
    /// Honours the configured [`Connectivity`].
    #[default]
    ConnectedComponents,

    /// Suzuki-Abe border following via `imageproc::contours::find_contours`,
    /// keeping only top-level outer borders.
    ///
    /// Border following is inherently 8-connected; the configured
    /// [`Connectivity`] is ignored.
    OuterBorders,
}

impl std::fmt::Display for RegionExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectedComponents => f.write_str("ConnectedComponents"),
            Self::OuterBorders => f.write_str("OuterBorders"),
        }
    }
}

/// Trait for region extraction strategies.
///
/// Input: a binary mask (non-zero = changed).
/// Output: one bounding box per region, before any area filtering.
pub trait RegionExtractor {
    /// Find the bounding box of every region in `mask`.
    fn extract(&self, mask: &GrayImage, connectivity: Connectivity) -> Vec<BoundingBox>;
}

impl RegionExtractor for RegionExtractorKind {
    fn extract(&self, mask: &GrayImage, connectivity: Connectivity) -> Vec<BoundingBox> {
        let mut boxes = match *self {
            Self::ConnectedComponents => component_boxes(mask, connectivity),
            Self::OuterBorders => outer_border_boxes(mask),
        };
        boxes.sort_unstable_by_key(|b| (b.y, b.x, b.height, b.width));
        boxes
    }
}

/// Drop every box whose rectangle area is below `min_area`.
#[must_use = "returns the retained boxes"]
pub fn filter_by_area(boxes: Vec<BoundingBox>, min_area: u64) -> Vec<BoundingBox> {
    boxes.into_iter().filter(|b| b.area() >= min_area).collect()
}

/// Extract and area-filter regions using the strategy, connectivity and
/// minimum area from `config`.
#[must_use = "returns the retained boxes"]
pub fn extract_regions(mask: &GrayImage, config: &DetectionConfig) -> Vec<BoundingBox> {
    let candidates = config.extractor.extract(mask, config.connectivity);
    filter_by_area(candidates, config.min_area)
}

/// Running inclusive extent of one region.
#[derive(Clone, Copy)]
struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Extent {
    const fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    const fn to_box(self) -> BoundingBox {
        BoundingBox::from_corners(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// One box per labelled connected component.
fn component_boxes(mask: &GrayImage, connectivity: Connectivity) -> Vec<BoundingBox> {
    let labels = imageproc::region_labelling::connected_components(
        mask,
        connectivity.into(),
        Luma([BACKGROUND]),
    );

    // Indexed by label; label 0 is background and never filled in.
    let mut extents: Vec<Option<Extent>> = Vec::new();
    for (x, y, Luma([label])) in labels.enumerate_pixels() {
        if *label == 0 {
            continue;
        }
        let idx = *label as usize;
        if idx >= extents.len() {
            extents.resize(idx + 1, None);
        }
        extents[idx].get_or_insert(Extent::at(x, y)).include(x, y);
    }

    extents.into_iter().flatten().map(Extent::to_box).collect()
}

/// One box per top-level outer border.
fn outer_border_boxes(mask: &GrayImage) -> Vec<BoundingBox> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let mut points = c.points.into_iter();
            let first = points.next()?;
            let mut extent = Extent::at(first.x, first.y);
            for p in points {
                extent.include(p.x, p.y);
            }
            Some(extent.to_box())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difference::FOREGROUND;

    fn fill(mask: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                mask.put_pixel(xx, yy, Luma([FOREGROUND]));
            }
        }
    }

    const BOTH: [RegionExtractorKind; 2] = [
        RegionExtractorKind::ConnectedComponents,
        RegionExtractorKind::OuterBorders,
    ];

    #[test]
    fn default_is_connected_components() {
        assert_eq!(
            RegionExtractorKind::default(),
            RegionExtractorKind::ConnectedComponents
        );
        assert_eq!(Connectivity::default(), Connectivity::Eight);
    }

    #[test]
    fn empty_mask_produces_no_regions() {
        let mask = GrayImage::new(10, 10);
        for kind in BOTH {
            assert!(kind.extract(&mask, Connectivity::Eight).is_empty());
        }
    }

    #[test]
    fn solid_block_produces_exact_box() {
        let mut mask = GrayImage::new(40, 40);
        fill(&mut mask, 5, 7, 10, 12);
        for kind in BOTH {
            let boxes = kind.extract(&mask, Connectivity::Eight);
            assert_eq!(boxes, vec![BoundingBox::new(5, 7, 10, 12)], "{kind}");
        }
    }

    #[test]
    fn single_pixel_is_a_one_by_one_box() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(4, 4, Luma([FOREGROUND]));
        for kind in BOTH {
            let boxes = kind.extract(&mask, Connectivity::Eight);
            assert_eq!(boxes, vec![BoundingBox::new(4, 4, 1, 1)], "{kind}");
        }
    }

    #[test]
    fn block_touching_border_fits_within_mask() {
        let mut mask = GrayImage::new(20, 20);
        fill(&mut mask, 10, 10, 10, 10);
        for kind in BOTH {
            let boxes = kind.extract(&mask, Connectivity::Eight);
            assert_eq!(boxes, vec![BoundingBox::new(10, 10, 10, 10)], "{kind}");
        }
    }

    #[test]
    fn separate_blocks_produce_separate_boxes_in_reading_order() {
        let mut mask = GrayImage::new(50, 50);
        fill(&mut mask, 30, 30, 5, 5);
        fill(&mut mask, 2, 2, 4, 4);
        for kind in BOTH {
            let boxes = kind.extract(&mask, Connectivity::Eight);
            assert_eq!(
                boxes,
                vec![BoundingBox::new(2, 2, 4, 4), BoundingBox::new(30, 30, 5, 5)],
                "{kind}"
            );
        }
    }

    #[test]
    fn diagonal_touch_depends_on_connectivity() {
        let mut mask = GrayImage::new(10, 10);
        fill(&mut mask, 1, 1, 2, 2);
        fill(&mut mask, 3, 3, 2, 2);
        let kind = RegionExtractorKind::ConnectedComponents;
        assert_eq!(kind.extract(&mask, Connectivity::Eight).len(), 1);
        assert_eq!(kind.extract(&mask, Connectivity::Four).len(), 2);
    }

    #[test]
    fn region_inside_hole_is_absorbed_by_outer_borders() {
        // A hollow ring with a dot in the middle.
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 5, 5, 20, 20);
        for y in 7..23 {
            for x in 7..23 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        mask.put_pixel(15, 15, Luma([FOREGROUND]));

        let components =
            RegionExtractorKind::ConnectedComponents.extract(&mask, Connectivity::Eight);
        assert_eq!(components.len(), 2);

        let outer = RegionExtractorKind::OuterBorders.extract(&mask, Connectivity::Eight);
        assert_eq!(outer, vec![BoundingBox::new(5, 5, 20, 20)]);
    }

    #[test]
    fn ring_is_one_region_not_two() {
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 5, 5, 20, 20);
        for y in 8..22 {
            for x in 8..22 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        for kind in BOTH {
            assert_eq!(kind.extract(&mask, Connectivity::Eight).len(), 1, "{kind}");
        }
    }

    #[test]
    fn area_filter_uses_rectangle_area() {
        // A thin diagonal line covers few pixels but a large rectangle.
        let mut mask = GrayImage::new(40, 40);
        for i in 0..30 {
            mask.put_pixel(i, i, Luma([FOREGROUND]));
        }
        let config = DetectionConfig {
            min_area: 900,
            ..DetectionConfig::default()
        };
        let boxes = extract_regions(&mask, &config);
        assert_eq!(boxes, vec![BoundingBox::new(0, 0, 30, 30)]);
    }

    #[test]
    fn area_filter_is_inclusive() {
        let boxes = vec![BoundingBox::new(0, 0, 10, 50), BoundingBox::new(0, 0, 10, 49)];
        assert_eq!(
            filter_by_area(boxes, 500),
            vec![BoundingBox::new(0, 0, 10, 50)]
        );
    }

    #[test]
    fn zero_min_area_keeps_everything() {
        let boxes = vec![BoundingBox::new(3, 3, 1, 1)];
        assert_eq!(filter_by_area(boxes.clone(), 0), boxes);
    }

    #[test]
    fn extractor_kind_serde_names() {
        let json = serde_json::to_string(&RegionExtractorKind::OuterBorders).unwrap_or_default();
        assert_eq!(json, "\"OuterBorders\"");
    }
}
