#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Filesystem packaging for outbound batches: archiving, manifest splitting and cleanup.
//!
//! Every operation here is blocking; async callers run them on a blocking thread.

pub mod archive;
pub mod cleanup;
pub mod error;
pub mod manifest;

pub use archive::{ArchiveReport, create_archive};
pub use cleanup::{remove_file, remove_tree};
pub use error::{FsOpsError, FsOpsResult};
pub use manifest::{
    DEFAULT_MANIFEST_SUFFIX, ManifestSplit, PayloadFile, RejectedFile, RoutingKeyRule, SourceFile,
    SplitRules, classify,
};
