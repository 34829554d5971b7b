//! Recursive directory removal.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Remove `path` and everything beneath it, contents first.
///
/// Stops at the first entry that cannot be removed; nothing after it is attempted.
///
/// # Errors
///
/// Returns the first traversal or removal failure, carrying the offending path.
pub fn remove_tree(path: &Path) -> FsOpsResult<()> {
    for entry in WalkDir::new(path).contents_first(true) {
        let entry = entry.map_err(|err| {
            let failed = err.path().unwrap_or(path).to_path_buf();
            FsOpsError::walkdir("cleanup.walk", failed, err)
        })?;
        let target = entry.path();
        if entry.file_type().is_dir() {
            fs::remove_dir(target).map_err(|err| FsOpsError::io("cleanup.remove_dir", target, err))?;
        } else {
            fs::remove_file(target)
                .map_err(|err| FsOpsError::io("cleanup.remove_file", target, err))?;
        }
    }
    Ok(())
}

/// Remove a single file.
///
/// # Errors
///
/// Returns an IO error carrying the path when the file cannot be removed.
pub fn remove_file(path: &Path) -> FsOpsResult<()> {
    fs::remove_file(path).map_err(|err| FsOpsError::io("cleanup.remove_single", path, err))
}
