//! Shared types for the changemark detection pipeline.

use serde::{Deserialize, Serialize};

use crate::regions::{Connectivity, RegionExtractorKind};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// decoded color images without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Minimal axis-aligned rectangle enclosing one changed region.
///
/// `x + width` and `y + height` never exceed the dimensions of the mask
/// the box was extracted from, and both `width` and `height` are at
/// least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (inclusive), pixels from the left of the image.
    pub x: u32,
    /// Top edge (inclusive), pixels from the top of the image.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Create a bounding box from its top-left corner and size.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build the box spanning two inclusive corner coordinates.
    #[must_use]
    pub const fn from_corners(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    /// Rectangle area (`width * height`), not the region's pixel count.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether the pixel at `(px, py)` lies inside the box.
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Whether the box lies entirely within an image of `dimensions`.
    #[must_use]
    pub const fn fits_within(&self, dimensions: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= dimensions.width
            && self.bottom() <= dimensions.height
    }
}

/// Configuration for the change detection pipeline.
///
/// An immutable value handed to the pipeline at construction time.
/// All parameters have defaults exposed as `DEFAULT_*` constants so the
/// CLI and tests can share them. Call [`validate`](Self::validate)
/// before processing a batch: an invalid parameter would invalidate
/// every pair uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Intensity difference a pixel must strictly exceed to be marked
    /// as changed (0-255 scale).
    pub threshold: u8,

    /// Side length of the square dilation neighbourhood. Must be odd.
    pub kernel_size: u32,

    /// How many times the dilation is applied.
    pub iterations: u32,

    /// Minimum bounding-box area (`width * height`) in square pixels for
    /// a region to be reported.
    pub min_area: u64,

    /// Pixel adjacency used when grouping foreground pixels.
    pub connectivity: Connectivity,

    /// Which region extraction strategy to use.
    pub extractor: RegionExtractorKind,
}

impl DetectionConfig {
    pub const DEFAULT_THRESHOLD: u8 = 30;
    pub const DEFAULT_KERNEL_SIZE: u32 = 5;
    pub const DEFAULT_ITERATIONS: u32 = 2;
    pub const DEFAULT_MIN_AREA: u64 = 500;

    /// Largest kernel side whose radius still fits the dilation's `u8`
    /// distance parameter.
    pub const MAX_KERNEL_SIZE: u32 = 2 * u8::MAX as u32 + 1;

    /// Upper bound on dilation iterations.
    pub const MAX_ITERATIONS: u32 = 64;

    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "kernel_size",
                reason: format!("must be a positive odd number, got {}", self.kernel_size),
            });
        }
        if self.kernel_size > Self::MAX_KERNEL_SIZE {
            return Err(PipelineError::InvalidParameter {
                name: "kernel_size",
                reason: format!(
                    "must be at most {}, got {}",
                    Self::MAX_KERNEL_SIZE,
                    self.kernel_size
                ),
            });
        }
        if self.iterations > Self::MAX_ITERATIONS {
            return Err(PipelineError::InvalidParameter {
                name: "iterations",
                reason: format!(
                    "must be at most {}, got {}",
                    Self::MAX_ITERATIONS,
                    self.iterations
                ),
            });
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            kernel_size: Self::DEFAULT_KERNEL_SIZE,
            iterations: Self::DEFAULT_ITERATIONS,
            min_area: Self::DEFAULT_MIN_AREA,
            connectivity: Connectivity::default(),
            extractor: RegionExtractorKind::default(),
        }
    }
}

/// Result of running the full pipeline on one image pair.
///
/// Owned by the pipeline until handed to whoever persists it.
#[derive(Debug, Clone)]
pub struct ChangeReport {
    /// Copy of the "after" image with every box outlined.
    pub annotated: RgbImage,
    /// Boxes drawn on `annotated`, sorted top-to-bottom then left-to-right.
    pub boxes: Vec<BoundingBox>,
    /// Dimensions shared by both input images.
    pub dimensions: Dimensions,
}

impl ChangeReport {
    /// Whether any change survived the area filter.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        !self.boxes.is_empty()
    }
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The before and after images differ in width or height.
    #[error("image dimensions differ: before is {before}, after is {after}")]
    DimensionMismatch {
        /// Dimensions of the "before" image.
        before: Dimensions,
        /// Dimensions of the "after" image.
        after: Dimensions,
    },

    /// A configuration parameter is out of its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable description of the constraint.
        reason: String,
    },
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead. A deserialized
/// `ImageDecode` becomes an `image::ImageError::IoError` carrying the
/// original message.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    DimensionMismatch {
        before: Dimensions,
        after: Dimensions,
    },
    InvalidParameter {
        name: String,
        reason: String,
    },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::DimensionMismatch { before, after } => PipelineErrorProxy::DimensionMismatch {
                before: *before,
                after: *after,
            },
            Self::InvalidParameter { name, reason } => PipelineErrorProxy::InvalidParameter {
                name: (*name).to_string(),
                reason: reason.clone(),
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::ImageDecode(image::ImageError::IoError(std::io::Error::other(msg)))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::DimensionMismatch { before, after } => {
                Self::DimensionMismatch { before, after }
            }
            PipelineErrorProxy::InvalidParameter { name, reason } => Self::InvalidParameter {
                name: known_parameter_name(&name),
                reason,
            },
        })
    }
}

/// Map a deserialized parameter name back onto a `'static` name.
fn known_parameter_name(name: &str) -> &'static str {
    match name {
        "threshold" => "threshold",
        "kernel_size" => "kernel_size",
        "iterations" => "iterations",
        "min_area" => "min_area",
        "connectivity" => "connectivity",
        "extractor" => "extractor",
        _ => "unknown",
    }
}
