//! Error types for pair discovery and batch execution.
//!
//! Two tiers: [`PairError`] is scoped to a single pair and turns into a
//! skip, while [`BatchError`] stops the whole run before (or after) any
//! pair is processed.

use std::path::PathBuf;

use changemark_pipeline::{Dimensions, PipelineError};
use serde::Serialize;

/// Why a single pair was skipped.
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    /// The "before" image has no matching "after" image.
    #[error("no counterpart found, expected {}", expected.display())]
    MissingCounterpart {
        /// Where the missing file was looked for.
        expected: PathBuf,
    },

    /// An image file could not be read from disk.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An image file was read but could not be decoded.
    #[error("failed to load {}: {source}", path.display())]
    Load {
        /// The undecodable file.
        path: PathBuf,
        /// Decoder error from the pipeline.
        source: PipelineError,
    },

    /// The two images of the pair differ in size.
    #[error("image dimensions differ: before is {before}, after is {after}")]
    DimensionMismatch {
        /// Dimensions of the "before" image.
        before: Dimensions,
        /// Dimensions of the "after" image.
        after: Dimensions,
    },

    /// Any other pipeline failure.
    #[error(transparent)]
    Pipeline(PipelineError),

    /// A result file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The destination that failed.
        path: PathBuf,
        /// Encoder or I/O error.
        source: image::ImageError,
    },
}

/// Coarse category of a [`PairError`], for summaries and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// See [`PairError::MissingCounterpart`].
    MissingCounterpart,
    /// See [`PairError::Read`] and [`PairError::Load`].
    LoadFailure,
    /// See [`PairError::DimensionMismatch`].
    DimensionMismatch,
    /// See [`PairError::Pipeline`].
    Pipeline,
    /// See [`PairError::Write`].
    WriteFailure,
}

impl PairError {
    /// The category this error falls into.
    #[must_use]
    pub const fn kind(&self) -> SkipKind {
        match self {
            Self::MissingCounterpart { .. } => SkipKind::MissingCounterpart,
            Self::Read { .. } | Self::Load { .. } => SkipKind::LoadFailure,
            Self::DimensionMismatch { .. } => SkipKind::DimensionMismatch,
            Self::Pipeline(_) => SkipKind::Pipeline,
            Self::Write { .. } => SkipKind::WriteFailure,
        }
    }
}

impl From<PipelineError> for PairError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::DimensionMismatch { before, after } => {
                Self::DimensionMismatch { before, after }
            }
            other => Self::Pipeline(other),
        }
    }
}

/// Problems with an explicit pairing manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest: {0}")]
    Read(#[from] std::io::Error),

    /// The manifest is not valid JSON of the expected shape.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two entries share a base name, so their results would collide.
    #[error("duplicate base name `{0}`")]
    DuplicateBaseName(String),

    /// A base name is empty or contains a path separator.
    #[error("invalid base name `{0}`: must be a non-empty file name without path separators")]
    InvalidBaseName(String),

    /// An entry uses the same file as both "before" and "after".
    #[error("entry `{0}` uses the same file for before and after")]
    SameFile(String),

    /// Two entries would write the same file into the output directory.
    #[error("entries `{first}` and `{second}` would both write `{file_name}`")]
    OutputCollision {
        /// The contested output file name.
        file_name: String,
        /// Entry that claimed the name first.
        first: String,
        /// Entry that claimed it again.
        second: String,
    },
}

/// Errors that stop the whole run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The detection configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidParameter(#[from] PipelineError),

    /// The input directory is missing or unreadable.
    #[error("cannot scan input directory {}: {source}", path.display())]
    InputDirectory {
        /// The directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The pairing manifest is unusable.
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        /// The manifest file.
        path: PathBuf,
        /// What was wrong with it.
        source: ManifestError,
    },

    /// The output directory could not be created.
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDirectory {
        /// The directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The run report could not be written.
    #[error("failed to write run report {}: {source}", path.display())]
    Report {
        /// The report destination.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
