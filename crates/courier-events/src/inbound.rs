//! Inbound transfer events and the jobs resolved from them.
//!
//! # Design
//! - The first comma is the only delimiter; everything after it is the landing zone tag.
//! - Paths are confined beneath the data root: no parent segments, a leading `/` is ignored.
//! - Landing zones compare case-insensitively; unknown tags are kept for reporting.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::error::{EventError, EventResult};

const DELIMITER: char = ',';
const ARCHIVE_EXTENSION: &str = "zip";

/// Destination named by an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandingZone {
    /// SMB print/fulfilment share.
    Prime,
    /// Remote vendor host reached over SFTP.
    Rrd,
    /// Any other tag; terminal and never retried.
    Unrecognized(String),
}

impl LandingZone {
    /// Match a tag against the known landing zones, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let trimmed = tag.trim();
        if trimmed.eq_ignore_ascii_case("prime") {
            Self::Prime
        } else if trimmed.eq_ignore_ascii_case("rrd") {
            Self::Rrd
        } else {
            Self::Unrecognized(trimmed.to_string())
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Prime => "prime",
            Self::Rrd => "rrd",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for LandingZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prime => f.write_str("Prime"),
            Self::Rrd => f.write_str("RRD"),
            Self::Unrecognized(tag) => f.write_str(tag),
        }
    }
}

/// Decoded `<relativeSourcePath>,<destinationTag>` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    relative_path: PathBuf,
    zone: LandingZone,
}

impl TransferEvent {
    /// Decode a raw payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not UTF-8, lacks the delimiter, has an empty
    /// side, or names a path that would leave the data root.
    pub fn decode(payload: &[u8]) -> EventResult<Self> {
        let text = std::str::from_utf8(payload).map_err(|_| EventError::InvalidUtf8)?;
        let (raw_path, raw_tag) = text
            .split_once(DELIMITER)
            .ok_or(EventError::MissingDelimiter)?;

        let raw_path = raw_path.trim();
        if raw_path.is_empty() {
            return Err(EventError::EmptyField {
                field: "source_path",
            });
        }
        if raw_tag.trim().is_empty() {
            return Err(EventError::EmptyField {
                field: "landing_zone",
            });
        }

        Ok(Self {
            relative_path: confine_relative(raw_path)?,
            zone: LandingZone::from_tag(raw_tag),
        })
    }

    /// Source path relative to the data root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Destination named by the event.
    #[must_use]
    pub const fn zone(&self) -> &LandingZone {
        &self.zone
    }

    /// Resolve the event against the local data root.
    #[must_use]
    pub fn resolve(&self, job_id: Uuid, data_root: &Path) -> ResolvedJob {
        let source_dir = data_root.join(&self.relative_path);
        let archive_base = self
            .relative_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = source_dir
            .parent()
            .map_or_else(|| data_root.to_path_buf(), Path::to_path_buf);
        let archive_path = parent.join(format!("{archive_base}.{ARCHIVE_EXTENSION}"));
        ResolvedJob {
            job_id,
            source_dir,
            zone: self.zone.clone(),
            archive_base,
            archive_path,
        }
    }
}

/// Job derived from a transfer event and the configured data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    /// Identifier assigned when the payload was received.
    pub job_id: Uuid,
    /// Absolute source directory.
    pub source_dir: PathBuf,
    /// Destination for the job.
    pub zone: LandingZone,
    /// Last segment of the source directory; names the archive.
    pub archive_base: String,
    /// Archive container path, a sibling of the source directory.
    pub archive_path: PathBuf,
}

impl ResolvedJob {
    /// Filename the archive is uploaded as.
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}.{ARCHIVE_EXTENSION}", self.archive_base)
    }
}

fn confine_relative(raw: &str) -> EventResult<PathBuf> {
    let mut confined = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(segment) => confined.push(segment),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                return Err(EventError::InvalidPath {
                    reason: "parent_segment",
                    value: raw.to_string(),
                });
            }
            Component::Prefix(_) => {
                return Err(EventError::InvalidPath {
                    reason: "prefix",
                    value: raw.to_string(),
                });
            }
        }
    }
    if confined.as_os_str().is_empty() {
        return Err(EventError::EmptyField {
            field: "source_path",
        });
    }
    Ok(confined)
}
