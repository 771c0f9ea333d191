//! JSON run report: the effective configuration plus every outcome.

use std::path::{Path, PathBuf};

use changemark_pipeline::diagnostics::PipelineDiagnostics;
use changemark_pipeline::{BoundingBox, DetectionConfig};
use serde::Serialize;

use crate::batch::{BatchConfig, BatchResult, BatchSummary, PairOutcome};
use crate::error::{BatchError, SkipKind};
use crate::naming::NamingConvention;

/// Serializable view of a finished run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    /// Detection parameters used for every pair.
    pub detection: &'a DetectionConfig,
    /// Filename protocol in effect.
    pub naming: &'a NamingConvention,
    /// Where results were written.
    pub output_dir: &'a Path,
    /// Counts across the run.
    pub summary: BatchSummary,
    /// One record per pair, sorted by base name.
    pub pairs: Vec<OutcomeRecord<'a>>,
}

/// Serializable view of one [`PairOutcome`].
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeRecord<'a> {
    /// See [`PairOutcome::Annotated`].
    Annotated {
        base_name: &'a str,
        result_path: &'a PathBuf,
        boxes: &'a [BoundingBox],
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostics: Option<&'a PipelineDiagnostics>,
    },
    /// See [`PairOutcome::Skipped`].
    Skipped {
        base_name: &'a str,
        kind: SkipKind,
        reason: String,
    },
}

impl<'a> From<&'a PairOutcome> for OutcomeRecord<'a> {
    fn from(outcome: &'a PairOutcome) -> Self {
        match outcome {
            PairOutcome::Annotated {
                base_name,
                result_path,
                boxes,
                diagnostics,
            } => Self::Annotated {
                base_name,
                result_path,
                boxes,
                diagnostics: diagnostics.as_deref(),
            },
            PairOutcome::Skipped { base_name, reason } => Self::Skipped {
                base_name,
                kind: reason.kind(),
                reason: reason.to_string(),
            },
        }
    }
}

impl<'a> RunReport<'a> {
    /// Build a report for `result`, produced by running `config`.
    #[must_use]
    pub fn new(config: &'a BatchConfig, result: &'a BatchResult) -> Self {
        Self {
            detection: &config.detection,
            naming: &config.naming,
            output_dir: &config.output_dir,
            summary: result.summary,
            pairs: result.outcomes.iter().map(OutcomeRecord::from).collect(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if any value cannot be represented.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Report`] if serialization or writing fails.
    pub fn write(&self, path: &Path) -> Result<(), BatchError> {
        let report_error = |source: std::io::Error| BatchError::Report {
            path: path.to_path_buf(),
            source,
        };
        let json = self.to_json().map_err(|e| report_error(e.into()))?;
        std::fs::write(path, json).map_err(report_error)
    }
}
