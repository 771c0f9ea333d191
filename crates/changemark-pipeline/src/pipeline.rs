//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect_changes`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use changemark_pipeline::{DetectionConfig, Pipeline, PipelineError, RgbImage};
//! # fn run(before: RgbImage, after: RgbImage) -> Result<(), PipelineError> {
//! let report = Pipeline::new(before, after, DetectionConfig::default())?
//!     .normalize()
//!     .build_mask()
//!     .clean_mask()
//!     .extract_regions()
//!     .annotate()
//!     .into_report();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! so stages cannot be skipped or reordered. The only fallible step is
//! construction: a pair whose images differ in size never becomes
//! [`Loaded`].
//!
//! # Memory
//!
//! Every stage carries the "after" color image forward for the
//! annotator, plus whatever raster the next stage consumes. Earlier
//! intermediates are dropped unless the caller asks for the
//! [`StagedResult`] via [`Annotated::into_staged`], in which case the
//! luminance pair, difference image and both masks are kept alive
//! until the end.

use crate::diagnostics::StageMetrics;
use crate::regions::RegionExtractor;
use crate::types::{
    BoundingBox, ChangeReport, DetectionConfig, Dimensions, GrayImage, PipelineError, RgbImage,
};

// ───────────────────────── Stage 0: Loaded ───────────────────────────

/// Pipeline state holding a validated image pair.
///
/// Both images are known to share the same dimensions. Call
/// [`normalize`](Self::normalize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct Loaded {
    config: DetectionConfig,
    before: RgbImage,
    after: RgbImage,
    dimensions: Dimensions,
}

impl Loaded {
    /// The "before" image.
    #[must_use]
    pub const fn before(&self) -> &RgbImage {
        &self.before
    }

    /// The "after" image.
    #[must_use]
    pub const fn after(&self) -> &RgbImage {
        &self.after
    }

    /// Dimensions shared by both images.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Convert both images to luminance and advance to [`Normalized`].
    ///
    /// The "before" color image is dropped here; only the "after" image
    /// is needed again (by the annotator).
    pub fn normalize(self) -> Normalized {
        let before_gray = crate::grayscale::normalize(&self.before);
        let after_gray = crate::grayscale::normalize(&self.after);
        Normalized {
            config: self.config,
            after: self.after,
            before_gray,
            after_gray,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 1: Normalized ───────────────────────

/// Pipeline state after luminance normalization.
///
/// Call [`build_mask`](Self::build_mask) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .build_mask() to continue"]
pub struct Normalized {
    config: DetectionConfig,
    after: RgbImage,
    before_gray: GrayImage,
    after_gray: GrayImage,
    dimensions: Dimensions,
}

impl Normalized {
    /// Luminance of the "before" image.
    #[must_use]
    pub const fn before_gray(&self) -> &GrayImage {
        &self.before_gray
    }

    /// Luminance of the "after" image.
    #[must_use]
    pub const fn after_gray(&self) -> &GrayImage {
        &self.after_gray
    }

    /// Compute the difference image and threshold it into a binary mask.
    pub fn build_mask(self) -> MaskBuilt {
        let difference =
            crate::difference::absolute_difference_unchecked(&self.before_gray, &self.after_gray);
        let mask = crate::difference::binarize(&difference, self.config.threshold);
        MaskBuilt {
            config: self.config,
            after: self.after,
            before_gray: self.before_gray,
            after_gray: self.after_gray,
            difference,
            mask,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 2: MaskBuilt ────────────────────────

/// Pipeline state after building the binary difference mask.
///
/// Call [`clean_mask`](Self::clean_mask) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .clean_mask() to continue"]
pub struct MaskBuilt {
    config: DetectionConfig,
    after: RgbImage,
    before_gray: GrayImage,
    after_gray: GrayImage,
    difference: GrayImage,
    mask: GrayImage,
    dimensions: Dimensions,
}

impl MaskBuilt {
    /// The absolute difference image.
    #[must_use]
    pub const fn difference(&self) -> &GrayImage {
        &self.difference
    }

    /// The thresholded binary mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Dilate the mask to merge fragments and advance to [`MaskCleaned`].
    pub fn clean_mask(self) -> MaskCleaned {
        let cleaned = crate::dilate::dilate_square(
            &self.mask,
            self.config.kernel_size,
            self.config.iterations,
        );
        MaskCleaned {
            config: self.config,
            after: self.after,
            before_gray: self.before_gray,
            after_gray: self.after_gray,
            difference: self.difference,
            mask: self.mask,
            cleaned,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 3: MaskCleaned ──────────────────────

/// Pipeline state after noise suppression.
///
/// Call [`extract_regions`](Self::extract_regions) to advance to the
/// next stage.
#[must_use = "pipeline stages are consumed by advancing; call .extract_regions() to continue"]
pub struct MaskCleaned {
    config: DetectionConfig,
    after: RgbImage,
    before_gray: GrayImage,
    after_gray: GrayImage,
    difference: GrayImage,
    mask: GrayImage,
    cleaned: GrayImage,
    dimensions: Dimensions,
}

impl MaskCleaned {
    /// The dilated mask.
    #[must_use]
    pub const fn cleaned(&self) -> &GrayImage {
        &self.cleaned
    }

    /// Find regions, drop the small ones, and advance to
    /// [`RegionsExtracted`].
    pub fn extract_regions(self) -> RegionsExtracted {
        let candidates = self
            .config
            .extractor
            .extract(&self.cleaned, self.config.connectivity);
        let candidate_count = candidates.len();
        let largest_candidate_area = candidates.iter().map(BoundingBox::area).max().unwrap_or(0);
        let boxes = crate::regions::filter_by_area(candidates, self.config.min_area);
        RegionsExtracted {
            config: self.config,
            after: self.after,
            intermediates: Intermediates {
                before_gray: self.before_gray,
                after_gray: self.after_gray,
                difference: self.difference,
                mask: self.mask,
                cleaned: self.cleaned,
            },
            boxes,
            candidate_count,
            largest_candidate_area,
            dimensions: self.dimensions,
        }
    }
}

/// Rasters carried past region extraction for [`StagedResult`].
struct Intermediates {
    before_gray: GrayImage,
    after_gray: GrayImage,
    difference: GrayImage,
    mask: GrayImage,
    cleaned: GrayImage,
}

// ───────────────────────── Stage 4: RegionsExtracted ─────────────────

/// Pipeline state after region extraction and area filtering.
///
/// Call [`annotate`](Self::annotate) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .annotate() to continue"]
pub struct RegionsExtracted {
    config: DetectionConfig,
    after: RgbImage,
    intermediates: Intermediates,
    boxes: Vec<BoundingBox>,
    candidate_count: usize,
    largest_candidate_area: u64,
    dimensions: Dimensions,
}

impl RegionsExtracted {
    /// Boxes that passed the minimum-area filter.
    #[must_use]
    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// Number of regions found before area filtering.
    #[must_use]
    pub const fn candidate_count(&self) -> usize {
        self.candidate_count
    }

    /// Outline every retained box on a copy of the "after" image.
    pub fn annotate(self) -> Annotated {
        let annotated = crate::annotate::annotate(&self.after, &self.boxes);
        Annotated {
            after: self.after,
            intermediates: self.intermediates,
            boxes: self.boxes,
            candidate_count: self.candidate_count,
            annotated,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 5: Annotated ────────────────────────

/// Pipeline state after annotation; the final stage.
///
/// Call [`into_report`](Self::into_report) for the [`ChangeReport`], or
/// [`into_staged`](Self::into_staged) to keep every intermediate.
#[must_use = "call .into_report() to extract the ChangeReport"]
pub struct Annotated {
    after: RgbImage,
    intermediates: Intermediates,
    boxes: Vec<BoundingBox>,
    candidate_count: usize,
    annotated: RgbImage,
    dimensions: Dimensions,
}

impl Annotated {
    /// The annotated copy of the "after" image.
    #[must_use]
    pub const fn annotated(&self) -> &RgbImage {
        &self.annotated
    }

    /// The boxes drawn on the annotated image.
    #[must_use]
    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    /// The unmodified "after" image.
    #[must_use]
    pub const fn after(&self) -> &RgbImage {
        &self.after
    }

    /// Consume the pipeline and return the [`ChangeReport`].
    #[must_use]
    pub fn into_report(self) -> ChangeReport {
        ChangeReport {
            annotated: self.annotated,
            boxes: self.boxes,
            dimensions: self.dimensions,
        }
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_staged(self) -> StagedResult {
        let Intermediates {
            before_gray,
            after_gray,
            difference,
            mask,
            cleaned,
        } = self.intermediates;
        StagedResult {
            before_gray,
            after_gray,
            difference,
            mask,
            cleaned,
            candidate_count: self.candidate_count,
            report: ChangeReport {
                annotated: self.annotated,
                boxes: self.boxes,
                dimensions: self.dimensions,
            },
        }
    }
}

/// Result of running the pipeline with all intermediate rasters kept.
///
/// Useful for tuning: the masks show exactly where the threshold and
/// dilation put the change boundaries.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Luminance of the "before" image.
    pub before_gray: GrayImage,
    /// Luminance of the "after" image.
    pub after_gray: GrayImage,
    /// Absolute per-pixel difference.
    pub difference: GrayImage,
    /// Thresholded binary mask.
    pub mask: GrayImage,
    /// Dilated mask the regions were extracted from.
    pub cleaned: GrayImage,
    /// Regions found before area filtering.
    pub candidate_count: usize,
    /// The final report.
    pub report: ChangeReport,
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. This trait bridges the two.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"loaded"`, `"mask"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Loaded through `5` for
    /// Annotated).
    const INDEX: usize;

    /// Metrics describing the work done to reach this stage.
    fn metrics(&self) -> StageMetrics;

    /// Advance to the next stage, or `None` if already at the final stage.
    fn next(self) -> Option<Stage>;

    /// Run all remaining stages and return the final [`StagedResult`].
    fn complete(self) -> StagedResult;
}

impl PipelineStage for Loaded {
    const NAME: &str = "loaded";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Load {
            width: self.dimensions.width,
            height: self.dimensions.height,
            pixel_count: self.dimensions.pixel_count(),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Normalized(self.normalize()))
    }

    fn complete(self) -> StagedResult {
        self.normalize().complete()
    }
}

impl PipelineStage for Normalized {
    const NAME: &str = "normalize";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Normalize {
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::MaskBuilt(self.build_mask()))
    }

    fn complete(self) -> StagedResult {
        self.build_mask().complete()
    }
}

impl PipelineStage for MaskBuilt {
    const NAME: &str = "mask";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Difference {
            threshold: self.config.threshold,
            max_difference: self.difference.pixels().map(|p| p.0[0]).max().unwrap_or(0),
            foreground_pixel_count: crate::difference::foreground_count(&self.mask),
            total_pixel_count: self.dimensions.pixel_count(),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::MaskCleaned(self.clean_mask()))
    }

    fn complete(self) -> StagedResult {
        self.clean_mask().complete()
    }
}

impl PipelineStage for MaskCleaned {
    const NAME: &str = "dilate";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Dilation {
            kernel_size: self.config.kernel_size,
            iterations: self.config.iterations,
            foreground_before: crate::difference::foreground_count(&self.mask),
            foreground_after: crate::difference::foreground_count(&self.cleaned),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::RegionsExtracted(self.extract_regions()))
    }

    fn complete(self) -> StagedResult {
        self.extract_regions().complete()
    }
}

impl PipelineStage for RegionsExtracted {
    const NAME: &str = "regions";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Regions {
            strategy: self.config.extractor.to_string(),
            min_area: self.config.min_area,
            candidate_count: self.candidate_count,
            retained_count: self.boxes.len(),
            largest_candidate_area: self.largest_candidate_area,
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Annotated(self.annotate()))
    }

    fn complete(self) -> StagedResult {
        self.annotate().into_staged()
    }
}

impl PipelineStage for Annotated {
    const NAME: &str = "annotate";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Annotate {
            box_count: self.boxes.len(),
        }
    }

    fn next(self) -> Option<Stage> {
        None
    }

    fn complete(self) -> StagedResult {
        self.into_staged()
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use changemark_pipeline::{DetectionConfig, Pipeline, PipelineError, RgbImage};
/// # use changemark_pipeline::pipeline::{Advance, Stage};
/// # fn run(before: RgbImage, after: RgbImage) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(before, after, DetectionConfig::default())?.into();
/// loop {
///     match stage.advance() {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete();
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Loaded`].
    Loaded(Loaded),
    /// See [`Normalized`].
    Normalized(Normalized),
    /// See [`MaskBuilt`].
    MaskBuilt(MaskBuilt),
    /// See [`MaskCleaned`].
    MaskCleaned(MaskCleaned),
    /// See [`RegionsExtracted`].
    RegionsExtracted(RegionsExtracted),
    /// See [`Annotated`].
    Annotated(Annotated),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails until you bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Loaded(_)
        | Stage::Normalized(_)
        | Stage::MaskBuilt(_)
        | Stage::MaskCleaned(_)
        | Stage::RegionsExtracted(_)
        | Stage::Annotated(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage and is returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Loaded(s) => s.$method($($arg),*),
            Self::Normalized(s) => s.$method($($arg),*),
            Self::MaskBuilt(s) => s.$method($($arg),*),
            Self::MaskCleaned(s) => s.$method($($arg),*),
            Self::RegionsExtracted(s) => s.$method($($arg),*),
            Self::Annotated(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Annotated(_))
    }

    /// Advance to the next stage, or `None` if already complete (the
    /// `Annotated` value is consumed).
    pub fn next(self) -> Option<Self> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    pub fn advance(self) -> Advance {
        if self.is_complete() {
            return Advance::Complete(self);
        }
        // The is_complete() guard above ensures next() returns Some.
        #[allow(clippy::unreachable)]
        let next = self
            .next()
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Advance::Next(next)
    }

    /// Run all remaining stages to completion.
    #[must_use]
    pub fn complete(self) -> StagedResult {
        delegate!(self, complete)
    }
}

// Provide a private helper trait so the macro can call `.name()` and
// `.index()` on `&self`: the `PipelineStage` trait's associated
// constants aren't callable via `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Loaded> for Stage {
    fn from(s: Loaded) -> Self {
        Self::Loaded(s)
    }
}

impl From<Normalized> for Stage {
    fn from(s: Normalized) -> Self {
        Self::Normalized(s)
    }
}

impl From<MaskBuilt> for Stage {
    fn from(s: MaskBuilt) -> Self {
        Self::MaskBuilt(s)
    }
}

impl From<MaskCleaned> for Stage {
    fn from(s: MaskCleaned) -> Self {
        Self::MaskCleaned(s)
    }
}

impl From<RegionsExtracted> for Stage {
    fn from(s: RegionsExtracted) -> Self {
        Self::RegionsExtracted(s)
    }
}

impl From<Annotated> for Stage {
    fn from(s: Annotated) -> Self {
        Self::Annotated(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental change detection pipeline for one image pair.
///
/// Created via [`Pipeline::new`], which validates the pair without doing
/// any processing. Each stage method consumes the current state and
/// returns the next, making it a compile-time error to skip stages or
/// call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Validate an image pair and enter the pipeline at [`Loaded`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the two images
    /// differ in width or height.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        before: RgbImage,
        after: RgbImage,
        config: DetectionConfig,
    ) -> Result<Loaded, PipelineError> {
        let dimensions = Dimensions::of(&before);
        let after_dimensions = Dimensions::of(&after);
        if dimensions != after_dimensions {
            return Err(PipelineError::DimensionMismatch {
                before: dimensions,
                after: after_dimensions,
            });
        }
        Ok(Loaded {
            config,
            before,
            after,
            dimensions,
        })
    }

    /// Decode both images from raw bytes, then validate them as with
    /// [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] or
    /// [`PipelineError::ImageDecode`] if either image cannot be decoded,
    /// and [`PipelineError::DimensionMismatch`] if their sizes differ.
    pub fn from_bytes(
        before: &[u8],
        after: &[u8],
        config: DetectionConfig,
    ) -> Result<Loaded, PipelineError> {
        let before = crate::grayscale::decode_rgb(before)?;
        let after = crate::grayscale::decode_rgb(after)?;
        Self::new(before, after, config)
    }
}
