//! Manifest/payload classification of a batch directory.
//!
//! # Design
//! - Only direct regular files are considered, in filename order.
//! - A manifest is any file whose name ends with the configured suffix (case-sensitive).
//! - Every other file is a payload and must yield a routing key from its name; names that
//!   are too short are rejected individually instead of failing the listing.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Default manifest filename suffix.
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".txt";

/// Fixed-offset, fixed-width routing key inside a payload filename.
///
/// Offsets and widths count characters, not bytes. A name must be at least
/// `offset + width` characters long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingKeyRule {
    /// Characters skipped before the key.
    pub offset: usize,
    /// Key length in characters.
    pub width: usize,
}

impl RoutingKeyRule {
    /// Shortest filename, in characters, the rule can extract a key from.
    #[must_use]
    pub const fn min_length(&self) -> usize {
        self.offset.saturating_add(self.width)
    }

    /// Extract the routing key from `file_name`.
    ///
    /// # Errors
    ///
    /// Returns a classification error when the name is shorter than [`Self::min_length`].
    pub fn extract(&self, file_name: &str) -> FsOpsResult<String> {
        let key: String = file_name.chars().skip(self.offset).take(self.width).collect();
        if key.chars().count() < self.width {
            return Err(FsOpsError::classification("name_too_short", file_name));
        }
        Ok(key)
    }
}

impl Default for RoutingKeyRule {
    fn default() -> Self {
        Self {
            offset: 10,
            width: 6,
        }
    }
}

/// Rules applied by [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRules {
    /// Suffix marking a manifest file.
    pub manifest_suffix: String,
    /// Routing key rule for payload files.
    pub routing_key: RoutingKeyRule,
}

impl Default for SplitRules {
    fn default() -> Self {
        Self {
            manifest_suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
            routing_key: RoutingKeyRule::default(),
        }
    }
}

/// A regular file found directly in the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
}

/// A payload file and the routing key extracted from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    /// Source file.
    pub file: SourceFile,
    /// Routing key.
    pub routing_key: String,
}

/// A file that could not be classified.
#[derive(Debug)]
pub struct RejectedFile {
    /// Offending path.
    pub path: PathBuf,
    /// Classification failure.
    pub error: FsOpsError,
}

/// Result of splitting a directory.
#[derive(Debug, Default)]
pub struct ManifestSplit {
    /// Manifest files, sorted by name.
    pub manifests: Vec<SourceFile>,
    /// Payload files with routing keys, sorted by name.
    pub payloads: Vec<PayloadFile>,
    /// Files that failed classification.
    pub rejected: Vec<RejectedFile>,
}

impl ManifestSplit {
    /// Whether the directory held no regular files at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty() && self.payloads.is_empty() && self.rejected.is_empty()
    }
}

/// Classify the direct regular files of `source_dir`.
///
/// # Errors
///
/// Returns an error only when the directory itself cannot be listed; per-file problems are
/// collected in [`ManifestSplit::rejected`].
pub fn classify(source_dir: &Path, rules: &SplitRules) -> FsOpsResult<ManifestSplit> {
    let mut split = ManifestSplit::default();
    let walker = WalkDir::new(source_dir)
        .min_depth(0)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|err| FsOpsError::walkdir("classify.list", source_dir, err))?;
        if entry.depth() == 0 {
            if !entry.file_type().is_dir() {
                return Err(FsOpsError::InvalidInput {
                    field: "source_dir",
                    reason: "not_a_directory",
                    value: Some(source_dir.to_string_lossy().into_owned()),
                });
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path().to_path_buf();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            split.rejected.push(RejectedFile {
                error: FsOpsError::classification(
                    "non_utf8_name",
                    entry.file_name().to_string_lossy(),
                ),
                path,
            });
            continue;
        };

        if name.ends_with(rules.manifest_suffix.as_str()) {
            split.manifests.push(SourceFile { name, path });
            continue;
        }
        match rules.routing_key.extract(&name) {
            Ok(routing_key) => split.payloads.push(PayloadFile {
                file: SourceFile { name, path },
                routing_key,
            }),
            Err(error) => split.rejected.push(RejectedFile { path, error }),
        }
    }

    Ok(split)
}
