//! File-naming convention and directory-based pair discovery.
//!
//! A "before" image `photo.jpg` pairs with the "after" image
//! `photo~2.jpg` in the same directory; the annotated result is written
//! as `photo~3.jpg`. The separator and both tags are configurable via
//! [`NamingConvention`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Image file extensions considered during discovery (case-insensitive).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// The filename protocol linking "before", "after" and result files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    /// Character joining the base name and a tag.
    pub separator: char,
    /// Tag identifying the "after" image.
    pub after_tag: String,
    /// Tag given to the annotated result.
    pub result_tag: String,
}

impl NamingConvention {
    pub const DEFAULT_SEPARATOR: char = '~';
    pub const DEFAULT_AFTER_TAG: &str = "2";
    pub const DEFAULT_RESULT_TAG: &str = "3";

    /// File name of the "after" image for `base_name`.
    #[must_use]
    pub fn after_file_name(&self, base_name: &str, extension: &str) -> String {
        self.tagged(base_name, &self.after_tag, extension)
    }

    /// File name of the annotated result for `base_name`.
    #[must_use]
    pub fn result_file_name(&self, base_name: &str, extension: &str) -> String {
        self.tagged(base_name, &self.result_tag, extension)
    }

    /// Whether a file stem carries a tag, i.e. is not a "before" image.
    #[must_use]
    pub fn is_tagged(&self, stem: &str) -> bool {
        stem.contains(self.separator)
    }

    fn tagged(&self, base_name: &str, tag: &str, extension: &str) -> String {
        format!("{base_name}{}{tag}.{extension}", self.separator)
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            separator: Self::DEFAULT_SEPARATOR,
            after_tag: Self::DEFAULT_AFTER_TAG.to_string(),
            result_tag: Self::DEFAULT_RESULT_TAG.to_string(),
        }
    }
}

/// A complete before/after pair ready for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePair {
    /// Shared base name; also names the result file.
    pub base_name: String,
    /// Path to the "before" image.
    pub before: PathBuf,
    /// Path to the "after" image.
    pub after: PathBuf,
}

impl ImagePair {
    /// Extension of the "before" image, reused for the result file.
    #[must_use]
    pub fn extension(&self) -> &str {
        self.before
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
    }
}

/// One discovery result: either a usable pair or a "before" image whose
/// counterpart is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveredPair {
    /// Both images exist.
    Complete(ImagePair),
    /// One of the two images was not found.
    MissingCounterpart {
        /// Base name of the pair.
        base_name: String,
        /// Path to the "before" image.
        before: PathBuf,
        /// The path that does not exist.
        missing: PathBuf,
    },
}

impl DiscoveredPair {
    /// Base name of the pair.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self {
            Self::Complete(pair) => &pair.base_name,
            Self::MissingCounterpart { base_name, .. } => base_name,
        }
    }
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`].
#[must_use]
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Scan the top level of `dir` and pair up images by naming convention.
///
/// Every untagged image is a "before" image. Its counterpart must have
/// the same extension. Results are sorted by base name.
///
/// # Errors
///
/// Returns [`BatchError::InputDirectory`] if `dir` does not exist, is
/// not a directory, or cannot be listed.
pub fn discover_pairs(
    dir: &Path,
    naming: &NamingConvention,
) -> Result<Vec<DiscoveredPair>, BatchError> {
    let input_error = |source: std::io::Error| BatchError::InputDirectory {
        path: dir.to_path_buf(),
        source,
    };
    if !dir.is_dir() {
        return Err(input_error(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "not a directory",
        )));
    }

    let mut file_names = BTreeSet::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| input_error(e.into()))?;
        if !entry.file_type().is_file() || !has_supported_extension(entry.path()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            file_names.insert(name.to_string());
        } else {
            log::debug!("ignoring non-UTF-8 file name {}", entry.path().display());
        }
    }

    let mut pairs = Vec::new();
    for name in &file_names {
        let path = Path::new(name);
        let (Some(stem), Some(extension)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|e| e.to_str()),
        ) else {
            continue;
        };
        if naming.is_tagged(stem) {
            log::debug!("{name} is tagged; not a before image");
            continue;
        }

        let after_name = naming.after_file_name(stem, extension);
        let before = dir.join(name);
        let after = dir.join(&after_name);
        if file_names.contains(&after_name) {
            log::debug!("paired {name} with {after_name}");
            pairs.push(DiscoveredPair::Complete(ImagePair {
                base_name: stem.to_string(),
                before,
                after,
            }));
        } else {
            log::debug!("{name} has no counterpart {after_name}");
            pairs.push(DiscoveredPair::MissingCounterpart {
                base_name: stem.to_string(),
                before,
                missing: after,
            });
        }
    }

    // Two extensions can share one stem; keep the order stable.
    pairs.sort_by(|a, b| a.base_name().cmp(b.base_name()));
    Ok(pairs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn default_convention_matches_tilde_tags() {
        let naming = NamingConvention::default();
        assert_eq!(naming.after_file_name("photo", "jpg"), "photo~2.jpg");
        assert_eq!(naming.result_file_name("photo", "jpg"), "photo~3.jpg");
        assert!(naming.is_tagged("photo~2"));
        assert!(!naming.is_tagged("photo"));
    }

    #[test]
    fn custom_convention() {
        let naming = NamingConvention {
            separator: '_',
            after_tag: "after".to_string(),
            result_tag: "diff".to_string(),
        };
        assert_eq!(naming.after_file_name("img", "png"), "img_after.png");
        assert_eq!(naming.result_file_name("img", "png"), "img_diff.png");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_supported_extension(Path::new("a.JPG")));
        assert!(has_supported_extension(Path::new("a.webp")));
        assert!(!has_supported_extension(Path::new("a.txt")));
        assert!(!has_supported_extension(Path::new("jpg")));
    }

    #[test]
    fn discovers_pairs_and_missing_counterparts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.jpg");
        touch(dir.path(), "b~2.jpg");
        touch(dir.path(), "a.png");
        touch(dir.path(), "a~2.png");
        touch(dir.path(), "lonely.jpg");
        touch(dir.path(), "a~3.png");
        touch(dir.path(), "notes.txt");

        let pairs = discover_pairs(dir.path(), &NamingConvention::default()).unwrap();
        let names: Vec<_> = pairs.iter().map(DiscoveredPair::base_name).collect();
        assert_eq!(names, vec!["a", "b", "lonely"]);
        assert!(matches!(
            &pairs[0],
            DiscoveredPair::Complete(p) if p.after == dir.path().join("a~2.png")
        ));
        assert!(matches!(
            &pairs[2],
            DiscoveredPair::MissingCounterpart { missing, .. }
                if *missing == dir.path().join("lonely~2.jpg")
        ));
    }

    #[test]
    fn counterpart_must_share_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x.jpg");
        touch(dir.path(), "x~2.png");
        let pairs = discover_pairs(dir.path(), &NamingConvention::default()).unwrap();
        assert!(matches!(
            pairs.as_slice(),
            [DiscoveredPair::MissingCounterpart { .. }]
        ));
    }

    #[test]
    fn subdirectories_are_not_scanned() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.jpg");
        touch(&dir.path().join("nested"), "deep~2.jpg");
        let pairs = discover_pairs(dir.path(), &NamingConvention::default()).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_pairs(&dir.path().join("nope"), &NamingConvention::default());
        assert!(matches!(result, Err(BatchError::InputDirectory { .. })));
    }
}
