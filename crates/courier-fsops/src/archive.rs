//! Flat, uncompressed zip archives of a single directory.
//!
//! # Design
//! - Only direct regular files are archived; subdirectories and symlinks are skipped.
//! - Entries are added in filename order and stored without compression.
//! - The container is written to a `.partial` sibling, synced, then renamed, so the final
//!   name only ever refers to a complete archive. Any failure removes the partial file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::{FsOpsError, FsOpsResult};

const PARTIAL_SUFFIX: &str = ".partial";
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Summary of a finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Final container path.
    pub path: PathBuf,
    /// Number of entries written.
    pub entries: usize,
    /// Container size in bytes.
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the container.
    pub sha256: String,
}

/// Archive every direct regular file of `source_dir` into `container`.
///
/// # Errors
///
/// Returns an error when the source is not a readable directory, a file cannot be added, or
/// the container cannot be written. No container is left behind on failure.
pub fn create_archive(container: &Path, source_dir: &Path) -> FsOpsResult<ArchiveReport> {
    let metadata = fs::metadata(source_dir)
        .map_err(|err| FsOpsError::io("archive.stat_source", source_dir, err))?;
    if !metadata.is_dir() {
        return Err(FsOpsError::InvalidInput {
            field: "source_dir",
            reason: "not_a_directory",
            value: Some(source_dir.to_string_lossy().into_owned()),
        });
    }

    let partial = partial_path(container);
    let written = write_entries(&partial, source_dir).and_then(|entries| {
        fs::rename(&partial, container)
            .map_err(|err| FsOpsError::io("archive.rename", container, err))?;
        Ok(entries)
    });
    let entries = match written {
        Ok(entries) => entries,
        Err(err) => {
            if let Err(remove_err) = fs::remove_file(&partial)
                && remove_err.kind() != io::ErrorKind::NotFound
            {
                debug!(path = %partial.display(), error = %remove_err, "failed to remove partial archive");
            }
            return Err(err);
        }
    };

    let (bytes, sha256) = digest(container)?;
    debug!(
        path = %container.display(),
        entries,
        bytes,
        "archive created"
    );
    Ok(ArchiveReport {
        path: container.to_path_buf(),
        entries,
        bytes,
        sha256,
    })
}

fn partial_path(container: &Path) -> PathBuf {
    let mut name = container
        .file_name()
        .map_or_else(OsString::new, std::ffi::OsStr::to_os_string);
    name.push(PARTIAL_SUFFIX);
    container.with_file_name(name)
}

fn write_entries(partial: &Path, source_dir: &Path) -> FsOpsResult<usize> {
    let file =
        File::create(partial).map_err(|err| FsOpsError::io("archive.create", partial, err))?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let mut entries = 0_usize;

    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.map_err(|err| FsOpsError::walkdir("archive.list", source_dir, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry
            .file_name()
            .to_str()
            .ok_or_else(|| FsOpsError::InvalidInput {
                field: "file_name",
                reason: "non_utf8",
                value: Some(path.to_string_lossy().into_owned()),
            })?
            .to_owned();
        let size = entry
            .metadata()
            .map_err(|err| FsOpsError::walkdir("archive.stat_entry", path, err))?
            .len();

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(size >= ZIP64_THRESHOLD);
        writer
            .start_file(name, options)
            .map_err(|err| FsOpsError::zip("archive.start_entry", path, err))?;
        let input = File::open(path).map_err(|err| FsOpsError::io("archive.open_entry", path, err))?;
        io::copy(&mut BufReader::new(input), &mut writer)
            .map_err(|err| FsOpsError::io("archive.copy_entry", path, err))?;
        entries += 1;
    }

    let buffered = writer
        .finish()
        .map_err(|err| FsOpsError::zip("archive.finish", partial, err))?;
    let file = buffered
        .into_inner()
        .map_err(|err| FsOpsError::io("archive.flush", partial, err.into_error()))?;
    file.sync_all()
        .map_err(|err| FsOpsError::io("archive.sync", partial, err))?;
    Ok(entries)
}

fn digest(path: &Path) -> FsOpsResult<(u64, String)> {
    let file = File::open(path).map_err(|err| FsOpsError::io("archive.open_digest", path, err))?;
    let mut hasher = Sha256::new();
    let bytes = io::copy(&mut BufReader::new(file), &mut hasher)
        .map_err(|err| FsOpsError::io("archive.digest", path, err))?;
    Ok((bytes, format!("{:x}", hasher.finalize())))
}
