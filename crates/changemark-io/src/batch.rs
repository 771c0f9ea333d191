//! Parallel batch execution with per-pair isolation.
//!
//! Run-fatal problems (bad configuration, unreadable input directory,
//! unusable manifest, uncreatable output directory) are reported before
//! any pair is touched. After that, every pair runs independently on a
//! rayon pool: a failure in one pair becomes a [`PairOutcome::Skipped`]
//! and never affects the others.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use changemark_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use changemark_pipeline::{BoundingBox, DetectionConfig};
use rayon::prelude::*;

use crate::error::{BatchError, PairError, SkipKind};
use crate::naming::{DiscoveredPair, ImagePair, NamingConvention};

/// Where the list of pairs comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PairingSource {
    /// Scan the input directory using the [`NamingConvention`].
    #[default]
    Convention,
    /// Read pairs from a JSON manifest file.
    Manifest(PathBuf),
}

/// Everything a batch run needs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory scanned for pairs (ignored for manifest pairing).
    pub input_dir: PathBuf,
    /// Directory receiving results; created if missing.
    pub output_dir: PathBuf,
    /// How pairs are found.
    pub pairing: PairingSource,
    /// Filename protocol for discovery and result names.
    pub naming: NamingConvention,
    /// Detection parameters shared by every pair.
    pub detection: DetectionConfig,
    /// Worker threads; `None` uses one per available core.
    pub jobs: Option<NonZeroUsize>,
    /// Keep per-stage timing and metrics for every processed pair.
    pub collect_diagnostics: bool,
}

impl BatchConfig {
    pub const DEFAULT_INPUT_DIR: &str = "input-images";
    pub const DEFAULT_OUTPUT_DIR: &str = "output-images";
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(Self::DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(Self::DEFAULT_OUTPUT_DIR),
            pairing: PairingSource::default(),
            naming: NamingConvention::default(),
            detection: DetectionConfig::default(),
            jobs: None,
            collect_diagnostics: false,
        }
    }
}

/// What happened to one pair.
#[derive(Debug)]
pub enum PairOutcome {
    /// The pair was processed and its results written.
    Annotated {
        /// Base name of the pair.
        base_name: String,
        /// Path of the annotated image.
        result_path: PathBuf,
        /// Boxes drawn on the annotated image.
        boxes: Vec<BoundingBox>,
        /// Stage timings and metrics, when requested.
        diagnostics: Option<Box<PipelineDiagnostics>>,
    },
    /// The pair was not processed.
    Skipped {
        /// Base name of the pair.
        base_name: String,
        /// Why it was skipped.
        reason: PairError,
    },
}

impl PairOutcome {
    /// Base name of the pair.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self {
            Self::Annotated { base_name, .. } | Self::Skipped { base_name, .. } => base_name,
        }
    }

    /// Whether the pair was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Counts across a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    /// Pairs processed and written.
    pub annotated: usize,
    /// Pairs skipped for any reason.
    pub skipped: usize,
    /// Skipped because a counterpart was missing.
    pub missing_counterpart: usize,
    /// Skipped because an image could not be loaded.
    pub load_failure: usize,
    /// Skipped because the two images differ in size.
    pub dimension_mismatch: usize,
    /// Skipped because results could not be written.
    pub write_failure: usize,
    /// Boxes drawn across all annotated pairs.
    pub total_boxes: usize,
}

impl BatchSummary {
    /// Tally a set of outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[PairOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Annotated { boxes, .. } => {
                    summary.annotated += 1;
                    summary.total_boxes += boxes.len();
                }
                PairOutcome::Skipped { reason, .. } => {
                    summary.skipped += 1;
                    match reason.kind() {
                        SkipKind::MissingCounterpart => summary.missing_counterpart += 1,
                        SkipKind::LoadFailure => summary.load_failure += 1,
                        SkipKind::DimensionMismatch => summary.dimension_mismatch += 1,
                        SkipKind::WriteFailure => summary.write_failure += 1,
                        SkipKind::Pipeline => {}
                    }
                }
            }
        }
        summary
    }

    /// Total number of pairs seen.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.annotated + self.skipped
    }
}

/// Outcomes of a run, sorted by base name.
#[derive(Debug)]
pub struct BatchResult {
    /// One entry per discovered pair.
    pub outcomes: Vec<PairOutcome>,
    /// Counts derived from `outcomes`.
    pub summary: BatchSummary,
}

/// Run change detection over every pair.
///
/// # Errors
///
/// Returns [`BatchError`] only for problems that affect the whole run;
/// per-pair failures are reported as [`PairOutcome::Skipped`].
pub fn run_batch(config: &BatchConfig) -> Result<BatchResult, BatchError> {
    config.detection.validate()?;

    let pairs = match &config.pairing {
        PairingSource::Convention => {
            crate::naming::discover_pairs(&config.input_dir, &config.naming)?
        }
        PairingSource::Manifest(path) => {
            crate::manifest::load_manifest(path, &config.naming)?
        }
    };
    log::info!("found {} candidate pair(s)", pairs.len());

    crate::output::prepare_output_dir(&config.output_dir)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs.map_or(0, NonZeroUsize::get))
        .build()?;
    log::debug!("processing on {} worker thread(s)", pool.current_num_threads());

    let mut outcomes: Vec<PairOutcome> = pool.install(|| {
        pairs
            .par_iter()
            .map(|pair| run_discovered(pair, config))
            .collect()
    });
    outcomes.sort_by(|a, b| a.base_name().cmp(b.base_name()));

    let summary = BatchSummary::from_outcomes(&outcomes);
    log::info!(
        "{} pair(s) annotated, {} skipped, {} box(es) drawn",
        summary.annotated,
        summary.skipped,
        summary.total_boxes,
    );
    Ok(BatchResult { outcomes, summary })
}

fn run_discovered(pair: &DiscoveredPair, config: &BatchConfig) -> PairOutcome {
    let result = match pair {
        DiscoveredPair::Complete(pair) => process_pair(pair, config),
        DiscoveredPair::MissingCounterpart { missing, .. } => Err(PairError::MissingCounterpart {
            expected: missing.clone(),
        }),
    };

    let base_name = pair.base_name().to_string();
    match result {
        Ok(processed) => PairOutcome::Annotated {
            base_name,
            result_path: processed.result_path,
            boxes: processed.boxes,
            diagnostics: processed.diagnostics,
        },
        Err(reason) => {
            log::warn!("skipping pair {base_name}: {reason}");
            PairOutcome::Skipped { base_name, reason }
        }
    }
}

struct Processed {
    result_path: PathBuf,
    boxes: Vec<BoundingBox>,
    diagnostics: Option<Box<PipelineDiagnostics>>,
}

/// Load, detect, and write one complete pair.
///
/// # Errors
///
/// Returns the [`PairError`] that stopped this pair.
fn process_pair(pair: &ImagePair, config: &BatchConfig) -> Result<Processed, PairError> {
    log::info!(
        "processing pair {}: {} and {}",
        pair.base_name,
        file_name(&pair.before),
        file_name(&pair.after),
    );

    let before = crate::load::load_rgb(&pair.before)?;
    let after = crate::load::load_rgb(&pair.after)?;

    let (staged, diagnostics) = changemark_pipeline::diagnostics::detect_with_diagnostics(
        before,
        after,
        &config.detection,
        &StdClock,
    )?;
    let report = staged.report;

    let written = crate::output::write_outputs(
        &config.output_dir,
        pair,
        &config.naming,
        &report.annotated,
    )?;
    log::info!(
        "saved {} ({} box(es))",
        written.result.display(),
        report.boxes.len()
    );

    Ok(Processed {
        result_path: written.result,
        boxes: report.boxes,
        diagnostics: config.collect_diagnostics.then(|| Box::new(diagnostics)),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
