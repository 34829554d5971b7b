//! Validated logical paths on a remote destination.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{TransferError, TransferResult};

/// Slash-separated destination path made of validated segments.
///
/// Segments are non-empty, never `.` or `..`, and contain no separators or NUL bytes, so a
/// mapped path can never leave the root it is joined under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// Build a path from individual segments.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidPath`] when there are no segments or any segment is invalid.
    pub fn from_segments<I, S>(segments: I) -> TransferResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(TransferError::InvalidPath {
                reason: "empty",
                value: String::new(),
            });
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }

    /// Single-segment path naming a file directly under the destination root.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidPath`] when the name is not a valid segment.
    pub fn file(name: &str) -> TransferResult<Self> {
        Self::from_segments([name])
    }

    /// Last segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Segments before the file name.
    #[must_use]
    pub fn parents(&self) -> &[String] {
        let len = self.segments.len();
        &self.segments[..len.saturating_sub(1)]
    }

    /// Map the logical path beneath a local root.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        let mut mapped = root.to_path_buf();
        for segment in &self.segments {
            mapped.push(segment);
        }
        mapped
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> TransferResult<()> {
    let reason = if segment.is_empty() {
        "empty_segment"
    } else if segment == "." || segment == ".." {
        "relative_segment"
    } else if segment.contains(['/', '\\', '\0']) {
        "separator_in_segment"
    } else {
        return Ok(());
    };
    Err(TransferError::InvalidPath {
        reason,
        value: segment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_segments_under_root() -> TransferResult<()> {
        let path = RemotePath::from_segments(["ABC123", "ProdPDFs", "doc.pdf"])?;
        assert_eq!(path.to_string(), "ABC123/ProdPDFs/doc.pdf");
        assert_eq!(path.file_name(), "doc.pdf");
        assert_eq!(path.parents(), ["ABC123".to_string(), "ProdPDFs".to_string()]);
        assert_eq!(
            path.under(Path::new("/mnt/prime/pdf")),
            PathBuf::from("/mnt/prime/pdf/ABC123/ProdPDFs/doc.pdf")
        );
        Ok(())
    }

    #[test]
    fn rejects_unsafe_segments() {
        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(
                    RemotePath::file(bad),
                    Err(TransferError::InvalidPath { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(RemotePath::from_segments(Vec::<String>::new()).is_err());
    }
}
