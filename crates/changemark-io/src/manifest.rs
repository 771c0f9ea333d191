//! Explicit pairing manifest.
//!
//! An alternative to the naming convention: a JSON array listing every
//! pair directly.
//!
//! ```json
//! [
//!   { "base_name": "door", "before": "door-monday.jpg", "after": "door-friday.jpg" }
//! ]
//! ```
//!
//! Relative paths are resolved against the directory containing the
//! manifest. Entries whose files are missing become
//! [`DiscoveredPair::MissingCounterpart`] so they are skipped like any
//! other incomplete pair.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BatchError, ManifestError};
use crate::naming::{DiscoveredPair, ImagePair, NamingConvention};
use crate::output::{before_copy_path, is_same_file, result_path};

/// One manifest entry as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Base name used for the result file.
    pub base_name: String,
    /// Path to the "before" image.
    pub before: PathBuf,
    /// Path to the "after" image.
    pub after: PathBuf,
}

/// Read and validate a manifest file.
///
/// # Errors
///
/// Returns [`BatchError::Manifest`] if the file cannot be read or
/// parsed, or if any entry fails validation.
pub fn load_manifest(
    path: &Path,
    naming: &NamingConvention,
) -> Result<Vec<DiscoveredPair>, BatchError> {
    let manifest_error = |source: ManifestError| BatchError::Manifest {
        path: path.to_path_buf(),
        source,
    };
    let json = std::fs::read_to_string(path).map_err(|e| manifest_error(e.into()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    parse_manifest(&json, base_dir, naming).map_err(manifest_error)
}

/// Parse and validate manifest JSON, resolving relative paths against
/// `base_dir`. Results are sorted by base name.
///
/// Every entry writes two files into the flat output directory: its
/// result (named by `naming`) and a copy of its "before" image under the
/// original file name. No two of those names may coincide.
///
/// # Errors
///
/// Returns [`ManifestError`] on malformed JSON, an invalid or duplicate
/// base name, an entry pairing a file with itself, or two entries whose
/// output files would collide.
pub fn parse_manifest(
    json: &str,
    base_dir: &Path,
    naming: &NamingConvention,
) -> Result<Vec<DiscoveredPair>, ManifestError> {
    let entries: Vec<ManifestEntry> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    let mut outputs: HashMap<PathBuf, String> = HashMap::new();
    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        validate_base_name(&entry.base_name)?;
        if !seen.insert(entry.base_name.clone()) {
            return Err(ManifestError::DuplicateBaseName(entry.base_name));
        }

        let pair = ImagePair {
            before: base_dir.join(&entry.before),
            after: base_dir.join(&entry.after),
            base_name: entry.base_name,
        };
        if pair.before == pair.after || is_same_file(&pair.before, &pair.after) {
            return Err(ManifestError::SameFile(pair.base_name));
        }

        for name in [
            before_copy_path(Path::new(""), &pair),
            result_path(Path::new(""), &pair, naming),
        ] {
            if let Some(first) = outputs.get(&name) {
                return Err(ManifestError::OutputCollision {
                    file_name: name.display().to_string(),
                    first: first.clone(),
                    second: pair.base_name,
                });
            }
            outputs.insert(name, pair.base_name.clone());
        }

        pairs.push(resolve(pair));
    }

    pairs.sort_by(|a, b| a.base_name().cmp(b.base_name()));
    Ok(pairs)
}

fn validate_base_name(name: &str) -> Result<(), ManifestError> {
    let is_plain_file_name = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name);
    if is_plain_file_name {
        Ok(())
    } else {
        Err(ManifestError::InvalidBaseName(name.to_string()))
    }
}

fn resolve(pair: ImagePair) -> DiscoveredPair {
    let ImagePair {
        base_name,
        before,
        after,
    } = pair;
    if !before.is_file() {
        log::debug!(
            "manifest entry {base_name}: before image {} missing",
            before.display()
        );
        return DiscoveredPair::MissingCounterpart {
            base_name,
            missing: before.clone(),
            before,
        };
    }
    if after.is_file() {
        DiscoveredPair::Complete(ImagePair {
            base_name,
            before,
            after,
        })
    } else {
        log::debug!(
            "manifest entry {base_name}: after image {} missing",
            after.display()
        );
        DiscoveredPair::MissingCounterpart {
            base_name,
            before,
            missing: after,
        }
    }
}
