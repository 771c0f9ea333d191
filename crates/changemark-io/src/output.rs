//! Writing results: the annotated image and a copy of the "before" image.

use std::path::{Path, PathBuf};

use changemark_pipeline::RgbImage;

use crate::error::{BatchError, PairError};
use crate::naming::{ImagePair, NamingConvention};

/// Files written for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    /// The annotated "after" image.
    pub result: PathBuf,
    /// The copy of the "before" image.
    pub before_copy: PathBuf,
}

/// Create `dir` and any missing parents.
///
/// # Errors
///
/// Returns [`BatchError::OutputDirectory`] if the directory cannot be
/// created.
pub fn prepare_output_dir(dir: &Path) -> Result<(), BatchError> {
    std::fs::create_dir_all(dir).map_err(|source| BatchError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

/// Where the annotated result for `pair` goes inside `output_dir`.
#[must_use]
pub fn result_path(output_dir: &Path, pair: &ImagePair, naming: &NamingConvention) -> PathBuf {
    output_dir.join(naming.result_file_name(&pair.base_name, pair.extension()))
}

/// Where the copy of the "before" image for `pair` goes inside
/// `output_dir`: its original file name.
#[must_use]
pub fn before_copy_path(output_dir: &Path, pair: &ImagePair) -> PathBuf {
    match pair.before.file_name() {
        Some(name) => output_dir.join(name),
        None => output_dir.join(format!("{}.{}", pair.base_name, pair.extension())),
    }
}

/// Save `annotated` as the result for `pair` and copy the "before" image
/// next to it under its original file name.
///
/// The output format follows the result file's extension. If the copy
/// destination is the "before" image itself (output and input
/// directories coincide) the copy is skipped.
///
/// # Errors
///
/// Returns [`PairError::Write`] if encoding, writing, or copying fails.
pub fn write_outputs(
    output_dir: &Path,
    pair: &ImagePair,
    naming: &NamingConvention,
    annotated: &RgbImage,
) -> Result<WrittenFiles, PairError> {
    let result = result_path(output_dir, pair, naming);
    annotated.save(&result).map_err(|source| PairError::Write {
        path: result.clone(),
        source,
    })?;

    let before_copy = before_copy_path(output_dir, pair);
    if !is_same_file(&pair.before, &before_copy) {
        std::fs::copy(&pair.before, &before_copy).map_err(|e| PairError::Write {
            path: before_copy.clone(),
            source: e.into(),
        })?;
    }

    Ok(WrittenFiles {
        result,
        before_copy,
    })
}

/// Whether `a` and `b` name the same existing file.
pub(crate) fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
