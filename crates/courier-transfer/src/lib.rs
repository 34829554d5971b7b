#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Remote transfer gateways.
//!
//! Layout: `gateway.rs` (the [`RemoteGateway`] seam), `share.rs` (mounted SMB share),
//! `sftp/` (SFTP over libssh2 with scoped teardown), `remote_path.rs` (validated paths).

pub mod error;
pub mod gateway;
pub mod remote_path;
pub mod sftp;
pub mod share;

pub use error::{TransferError, TransferResult};
pub use gateway::{RemoteGateway, UploadReceipt};
pub use remote_path::RemotePath;
pub use sftp::{
    Deadline, SecureConnector, SecureSession, SftpCredentials, SftpGateway, SftpTarget,
    Ssh2Connector, TeardownStep,
};
pub use share::ShareGateway;
