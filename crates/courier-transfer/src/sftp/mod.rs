//! SFTP uploads with scoped teardown.
//!
//! # Design
//! - Credentials and target are rebuilt from configuration on every call; nothing is shared
//!   between uploads.
//! - Session work is blocking and runs on the blocking pool. The upload [`Deadline`] is
//!   checked before every session step and between write chunks, and the gateway reports the
//!   session's own verdict, so a timed-out upload never finishes remotely afterwards.
//! - Teardown runs channel exit, channel disconnect, session disconnect, then local file
//!   close. A step runs only when its resource was acquired, every step is attempted even if
//!   an earlier one fails, and release failures never replace the primary result.

mod deadline;
mod ssh;

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_config::{HostKeyPolicy, RrdConfig, Secret};
use tracing::{debug, warn};

use crate::error::{TransferError, TransferResult};
use crate::gateway::{RemoteGateway, UploadReceipt};
use crate::remote_path::RemotePath;

pub use deadline::Deadline;
pub use ssh::{Ssh2Connector, Ssh2Session};

/// Where and how to reach the SFTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpTarget {
    /// Host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Remote working directory.
    pub remote_dir: String,
    /// Host key trust decision.
    pub host_key_policy: HostKeyPolicy,
    /// TCP connect deadline.
    pub connect_timeout: Duration,
    /// Deadline applied to blocking session operations.
    pub session_timeout: Duration,
}

impl SftpTarget {
    /// Build the target from RRD settings.
    #[must_use]
    pub fn from_config(config: &RrdConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            remote_dir: config.remote_dir.clone(),
            host_key_policy: config.host_key_policy.clone(),
            connect_timeout: config.connect_timeout,
            session_timeout: config.upload_timeout,
        }
    }
}

/// Login material for one upload.
#[derive(Clone)]
pub struct SftpCredentials {
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: Secret,
}

impl SftpCredentials {
    /// Build credentials from RRD settings.
    #[must_use]
    pub fn from_config(config: &RrdConfig) -> Self {
        Self {
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

impl fmt::Debug for SftpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpCredentials")
            .field("user", &self.user)
            .field("password", &self.password)
            .finish()
    }
}

/// Opens the transport to an SFTP server.
pub trait SecureConnector: Send + Sync + 'static {
    /// Session produced by a successful connect.
    type Session: SecureSession;

    /// Resolve the host and open the TCP transport.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot be resolved or reached in time.
    fn connect(&self, target: &SftpTarget, deadline: Deadline) -> TransferResult<Self::Session>;
}

/// Stepwise SSH session driven by [`SftpGateway`].
///
/// The gateway calls the setup steps in order and decides which release steps to run.
/// `put` must stop with [`TransferError::Timeout`] once `deadline` is spent and must not
/// report success for a transfer that finished after it.
#[allow(missing_docs, clippy::missing_errors_doc)]
pub trait SecureSession: Send {
    fn handshake(&mut self) -> TransferResult<()>;
    fn verify_host(&mut self, target: &SftpTarget) -> TransferResult<()>;
    fn authenticate(&mut self, credentials: &SftpCredentials) -> TransferResult<()>;
    fn open_channel(&mut self) -> TransferResult<()>;
    fn change_dir(&mut self, dir: &str) -> TransferResult<()>;
    fn put(
        &mut self,
        local: &mut dyn Read,
        remote: &RemotePath,
        deadline: Deadline,
    ) -> TransferResult<u64>;
    fn exit_channel(&mut self) -> TransferResult<()>;
    fn disconnect_channel(&mut self) -> TransferResult<()>;
    fn disconnect(&mut self) -> TransferResult<()>;
}

/// Release step performed during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    /// SFTP channel exit.
    ChannelExit,
    /// SFTP channel disconnect.
    ChannelDisconnect,
    /// SSH session disconnect.
    SessionDisconnect,
    /// Local file close.
    LocalClose,
}

impl TeardownStep {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ChannelExit => "channel_exit",
            Self::ChannelDisconnect => "channel_disconnect",
            Self::SessionDisconnect => "session_disconnect",
            Self::LocalClose => "local_close",
        }
    }
}

struct SessionScope<S: SecureSession> {
    session: S,
    session_open: bool,
    channel_open: bool,
    local: Option<File>,
    released: bool,
}

impl<S: SecureSession> SessionScope<S> {
    const fn new(session: S) -> Self {
        Self {
            session,
            session_open: false,
            channel_open: false,
            local: None,
            released: false,
        }
    }

    fn drive(
        &mut self,
        target: &SftpTarget,
        credentials: &SftpCredentials,
        local: &Path,
        remote: &RemotePath,
        deadline: Deadline,
    ) -> TransferResult<u64> {
        deadline.check("sftp.handshake")?;
        self.session.handshake()?;
        self.session_open = true;
        deadline.check("sftp.verify_host")?;
        self.session.verify_host(target)?;
        deadline.check("sftp.authenticate")?;
        self.session.authenticate(credentials)?;
        deadline.check("sftp.open_channel")?;
        self.session.open_channel()?;
        self.channel_open = true;
        deadline.check("sftp.change_dir")?;
        self.session.change_dir(&target.remote_dir)?;

        deadline.check("sftp.put")?;
        let file = File::open(local).map_err(|err| TransferError::io("sftp.open_local", local, err))?;
        let reader = self.local.insert(file);
        self.session.put(reader, remote, deadline)
    }

    fn release(&mut self) -> Vec<TeardownStep> {
        let mut performed = Vec::new();
        if self.released {
            return performed;
        }
        self.released = true;

        if self.channel_open {
            self.channel_open = false;
            let exit = self.session.exit_channel();
            record(&mut performed, TeardownStep::ChannelExit, exit);
            let disconnect = self.session.disconnect_channel();
            record(&mut performed, TeardownStep::ChannelDisconnect, disconnect);
        }
        if self.session_open {
            self.session_open = false;
            let disconnect = self.session.disconnect();
            record(&mut performed, TeardownStep::SessionDisconnect, disconnect);
        }
        if let Some(file) = self.local.take() {
            drop(file);
            performed.push(TeardownStep::LocalClose);
        }
        performed
    }
}

impl<S: SecureSession> Drop for SessionScope<S> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn record(performed: &mut Vec<TeardownStep>, step: TeardownStep, result: TransferResult<()>) {
    if let Err(err) = result {
        warn!(step = step.as_str(), error = %err, "sftp teardown step failed");
    }
    performed.push(step);
}

fn run_session<S: SecureSession>(
    session: S,
    target: &SftpTarget,
    credentials: &SftpCredentials,
    local: &Path,
    remote: &RemotePath,
    deadline: Deadline,
) -> (TransferResult<u64>, Vec<TeardownStep>) {
    let mut scope = SessionScope::new(session);
    let result = scope.drive(target, credentials, local, remote, deadline);
    let released = scope.release();
    (result, released)
}

fn upload_blocking<C: SecureConnector>(
    connector: &C,
    target: &SftpTarget,
    credentials: &SftpCredentials,
    local: &Path,
    remote: &RemotePath,
    deadline: Deadline,
) -> TransferResult<u64> {
    deadline.check("sftp.connect")?;
    let session = connector.connect(target, deadline)?;
    let (result, released) = run_session(session, target, credentials, local, remote, deadline);
    debug!(
        host = %target.host,
        released = ?released,
        ok = result.is_ok(),
        remaining_ms = deadline.remaining().as_millis(),
        "sftp session closed"
    );
    result
}

/// Gateway uploading over SFTP.
pub struct SftpGateway<C: SecureConnector = Ssh2Connector> {
    connector: Arc<C>,
    config: RrdConfig,
}

impl SftpGateway<Ssh2Connector> {
    /// Gateway backed by libssh2.
    #[must_use]
    pub fn from_config(config: &RrdConfig) -> Self {
        Self::new(Ssh2Connector, config.clone())
    }
}

impl<C: SecureConnector> SftpGateway<C> {
    /// Gateway backed by a custom connector.
    pub fn new(connector: C, config: RrdConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
        }
    }

    fn describe(&self, remote: &RemotePath) -> String {
        format!(
            "sftp://{}@{}:{}/{}/{}",
            self.config.user,
            self.config.host,
            self.config.port,
            self.config.remote_dir.trim_matches('/'),
            remote
        )
    }
}

#[async_trait]
impl<C: SecureConnector> RemoteGateway for SftpGateway<C> {
    fn name(&self) -> &'static str {
        "sftp"
    }

    async fn upload(&self, local: &Path, remote: &RemotePath) -> TransferResult<UploadReceipt> {
        let target = SftpTarget::from_config(&self.config);
        let credentials = SftpCredentials::from_config(&self.config);
        let connector = Arc::clone(&self.connector);
        let local: PathBuf = local.to_path_buf();
        let remote_path = remote.clone();
        let deadline = Deadline::after(self.config.upload_timeout);

        let task = tokio::task::spawn_blocking(move || {
            upload_blocking(
                connector.as_ref(),
                &target,
                &credentials,
                &local,
                &remote_path,
                deadline,
            )
        });
        let bytes = task.await.map_err(|source| TransferError::Join {
            operation: "sftp.upload",
            source,
        })??;

        Ok(UploadReceipt {
            remote: self.describe(remote),
            bytes,
        })
    }
}
