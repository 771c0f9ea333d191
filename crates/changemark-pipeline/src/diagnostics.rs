//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are intended for threshold and kernel tuning. Use
//! [`detect_with_diagnostics`] to run the full pipeline and collect
//! them alongside the intermediate results.
//!
//! The pipeline crate performs no I/O, so timestamps come from a
//! caller-supplied [`Clock`]. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration`
//! does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage, StagedResult};
use crate::types::{DetectionConfig, PipelineError, RgbImage};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: pair validation.
    pub load: StageDiagnostics,
    /// Stage 1: luminance conversion of both images.
    pub normalize: StageDiagnostics,
    /// Stage 2: absolute difference and threshold.
    pub difference: StageDiagnostics,
    /// Stage 3: mask dilation.
    pub dilation: StageDiagnostics,
    /// Stage 4: region extraction and area filter.
    pub regions: StageDiagnostics,
    /// Stage 5: box drawing.
    pub annotate: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Pair validation metrics.
    Load {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Luminance conversion metrics.
    Normalize {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Difference mask metrics.
    Difference {
        /// Threshold the difference had to exceed.
        threshold: u8,
        /// Largest absolute difference anywhere in the image.
        max_difference: u8,
        /// Pixels marked as changed.
        foreground_pixel_count: u64,
        /// Total pixel count for computing change density.
        total_pixel_count: u64,
    },
    /// Dilation metrics.
    Dilation {
        /// Side of the square structuring element.
        kernel_size: u32,
        /// Number of passes.
        iterations: u32,
        /// Changed pixels before dilation.
        foreground_before: u64,
        /// Changed pixels after dilation.
        foreground_after: u64,
    },
    /// Region extraction metrics.
    Regions {
        /// Which extractor strategy was used.
        strategy: String,
        /// Minimum box area kept.
        min_area: u64,
        /// Regions found before the area filter.
        candidate_count: usize,
        /// Regions kept after the area filter.
        retained_count: usize,
        /// Area of the largest candidate box.
        largest_candidate_area: u64,
    },
    /// Annotation metrics.
    Annotate {
        /// Boxes drawn.
        box_count: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Regions found before the area filter.
    pub candidate_count: usize,
    /// Boxes in the final report.
    pub box_count: usize,
}

/// Run the full pipeline on one pair, timing every stage with `clock`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `config` fails
/// validation and [`PipelineError::DimensionMismatch`] if the images
/// differ in size.
pub fn detect_with_diagnostics<C: Clock>(
    before: RgbImage,
    after: RgbImage,
    config: &DetectionConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let run_start = clock.now();

    let (loaded, load) = timed(clock, || Pipeline::new(before, after, config.clone()));
    let loaded = loaded?;
    let load = load.with_metrics(loaded.metrics());

    let (normalized, normalize) = timed(clock, || loaded.normalize());
    let normalize = normalize.with_metrics(normalized.metrics());

    let (built, difference) = timed(clock, || normalized.build_mask());
    let difference = difference.with_metrics(built.metrics());

    let (cleaned, dilation) = timed(clock, || built.clean_mask());
    let dilation = dilation.with_metrics(cleaned.metrics());

    let (extracted, regions) = timed(clock, || cleaned.extract_regions());
    let regions = regions.with_metrics(extracted.metrics());

    let (annotated, annotate) = timed(clock, || extracted.annotate());
    let annotate = annotate.with_metrics(annotated.metrics());

    let staged = annotated.into_staged();
    let total_duration = clock.elapsed(&run_start);

    let dimensions = staged.report.dimensions;
    let summary = PipelineSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        candidate_count: staged.candidate_count,
        box_count: staged.report.boxes.len(),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            load,
            normalize,
            difference,
            dilation,
            regions,
            annotate,
            total_duration,
            summary,
        },
    ))
}

/// Elapsed time of one stage transition, awaiting its metrics.
struct Timing(Duration);

impl Timing {
    const fn with_metrics(self, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: self.0,
            metrics,
        }
    }
}

fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Timing) {
    let start = clock.now();
    let value = f();
    (value, Timing(clock.elapsed(&start)))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Candidates: {}  |  Boxes: {}",
            self.summary.candidate_count, self.summary.box_count,
        ));

        lines.join("\n")
    }

    /// Every stage in execution order, with its display name.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Load", &self.load),
            ("Normalize", &self.normalize),
            ("Difference", &self.difference),
            ("Dilation", &self.dilation),
            ("Regions", &self.regions),
            ("Annotate", &self.annotate),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Load {
            width,
            height,
            pixel_count,
        } => format!("{width}x{height} ({pixel_count} px)"),
        StageMetrics::Normalize { width, height } => format!("{width}x{height}"),
        StageMetrics::Difference {
            threshold,
            max_difference,
            foreground_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *foreground_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "threshold={threshold} max={max_difference} changed={foreground_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::Dilation {
            kernel_size,
            iterations,
            foreground_before,
            foreground_after,
        } => format!(
            "{kernel_size}x{kernel_size} x{iterations} px={foreground_before}->{foreground_after}",
        ),
        StageMetrics::Regions {
            strategy,
            min_area,
            candidate_count,
            retained_count,
            largest_candidate_area,
        } => format!(
            "{strategy} {candidate_count}->{retained_count} regions (min_area={min_area} largest={largest_candidate_area})",
        ),
        StageMetrics::Annotate { box_count } => format!("{box_count} boxes"),
    }
}
