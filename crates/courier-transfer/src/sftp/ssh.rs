//! libssh2-backed session.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use courier_config::HostKeyPolicy;
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};
use tracing::debug;

use super::{Deadline, SecureConnector, SecureSession, SftpCredentials, SftpTarget};
use crate::error::{TransferError, TransferResult};
use crate::remote_path::RemotePath;

const DISCONNECT_DESCRIPTION: &str = "courier transfer complete";
const REMOTE_DIR_MODE: i32 = 0o755;
const WRITE_CHUNK: usize = 32 * 1024;
const UNLINK_TIMEOUT_MS: u32 = 1_000;
/// `SSH_FX_OP_UNSUPPORTED`; servers without the fsync extension answer with it.
const SFTP_OP_UNSUPPORTED: i32 = 8;

/// Connector opening TCP transports for libssh2 sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ssh2Connector;

impl SecureConnector for Ssh2Connector {
    type Session = Ssh2Session;

    fn connect(&self, target: &SftpTarget, deadline: Deadline) -> TransferResult<Ssh2Session> {
        let addrs = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|err| TransferError::network("sftp.resolve", &target.host, err))?;

        let mut last_error = None;
        for addr in addrs {
            deadline.check("sftp.connect")?;
            let budget = target
                .connect_timeout
                .min(deadline.remaining())
                .max(Duration::from_millis(1));
            match TcpStream::connect_timeout(&addr, budget) {
                Ok(stream) => return Ssh2Session::attach(stream, target, deadline),
                Err(err) => last_error = Some(err),
            }
        }
        Err(TransferError::network(
            "sftp.connect",
            &target.host,
            last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
            }),
        ))
    }
}

/// SSH session with an optional SFTP channel.
pub struct Ssh2Session {
    session: Session,
    sftp: Option<Sftp>,
    remote_dir: Option<PathBuf>,
    deadline: Deadline,
}

impl Ssh2Session {
    fn attach(stream: TcpStream, target: &SftpTarget, deadline: Deadline) -> TransferResult<Self> {
        let socket_timeout = target
            .session_timeout
            .min(deadline.remaining())
            .max(Duration::from_millis(1));
        stream
            .set_read_timeout(Some(socket_timeout))
            .and_then(|()| stream.set_write_timeout(Some(socket_timeout)))
            .map_err(|err| TransferError::network("sftp.socket_timeouts", &target.host, err))?;

        let mut session = Session::new().map_err(|err| TransferError::ssh("sftp.session", err))?;
        session.set_tcp_stream(stream);
        let attached = Self {
            session,
            sftp: None,
            remote_dir: None,
            deadline,
        };
        attached.arm();
        Ok(attached)
    }

    /// Bound the next blocking libssh2 call by the time left on the upload.
    fn arm(&self) {
        self.session.set_timeout(self.deadline.remaining_millis());
    }

    fn channel(&self, operation: &'static str) -> TransferResult<&Sftp> {
        self.sftp
            .as_ref()
            .ok_or_else(|| TransferError::protocol(operation, "channel_not_open", None))
    }

    fn ensure_parents(sftp: &Sftp, base: &Path, remote: &RemotePath) -> TransferResult<PathBuf> {
        let mut current = base.to_path_buf();
        for segment in remote.parents() {
            current.push(segment);
            if sftp.stat(&current).is_err() {
                sftp.mkdir(&current, REMOTE_DIR_MODE)
                    .map_err(|err| TransferError::ssh("sftp.mkdir", err))?;
            }
        }
        current.push(remote.file_name());
        Ok(current)
    }
}

impl SecureSession for Ssh2Session {
    fn handshake(&mut self) -> TransferResult<()> {
        self.arm();
        self.session
            .handshake()
            .map_err(|err| TransferError::ssh("sftp.handshake", err))
    }

    fn verify_host(&mut self, target: &SftpTarget) -> TransferResult<()> {
        let HostKeyPolicy::KnownHosts(path) = &target.host_key_policy else {
            return Ok(());
        };
        self.arm();
        let mut known = self
            .session
            .known_hosts()
            .map_err(|err| TransferError::ssh("sftp.known_hosts", err))?;
        known
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|err| TransferError::ssh("sftp.known_hosts_read", err))?;
        let (key, _) = self.session.host_key().ok_or_else(|| TransferError::HostKey {
            reason: "missing_key",
            host: target.host.clone(),
        })?;

        let reason = match known.check_port(&target.host, target.port, key) {
            CheckResult::Match => return Ok(()),
            CheckResult::NotFound => "unknown_host",
            CheckResult::Mismatch => "key_mismatch",
            CheckResult::Failure => "check_failed",
        };
        Err(TransferError::HostKey {
            reason,
            host: target.host.clone(),
        })
    }

    fn authenticate(&mut self, credentials: &SftpCredentials) -> TransferResult<()> {
        self.arm();
        self.session
            .userauth_password(&credentials.user, credentials.password.expose())
            .map_err(|err| TransferError::ssh("sftp.authenticate", err))?;
        if self.session.authenticated() {
            Ok(())
        } else {
            Err(TransferError::protocol(
                "sftp.authenticate",
                "not_authenticated",
                Some(credentials.user.clone()),
            ))
        }
    }

    fn open_channel(&mut self) -> TransferResult<()> {
        self.arm();
        let sftp = self
            .session
            .sftp()
            .map_err(|err| TransferError::ssh("sftp.open_channel", err))?;
        self.sftp = Some(sftp);
        Ok(())
    }

    fn change_dir(&mut self, dir: &str) -> TransferResult<()> {
        self.arm();
        let stat = self
            .channel("sftp.change_dir")?
            .stat(Path::new(dir))
            .map_err(|err| TransferError::ssh("sftp.change_dir", err))?;
        if !stat.is_dir() {
            return Err(TransferError::protocol(
                "sftp.change_dir",
                "not_a_directory",
                Some(dir.to_string()),
            ));
        }
        self.remote_dir = Some(PathBuf::from(dir));
        Ok(())
    }

    fn put(
        &mut self,
        local: &mut dyn Read,
        remote: &RemotePath,
        deadline: Deadline,
    ) -> TransferResult<u64> {
        let base = self
            .remote_dir
            .clone()
            .ok_or_else(|| TransferError::protocol("sftp.put", "no_working_directory", None))?;
        self.arm();
        let sftp = self.channel("sftp.put")?;
        let destination = Self::ensure_parents(sftp, &base, remote)?;
        let mut file = sftp
            .create(&destination)
            .map_err(|err| TransferError::ssh("sftp.create", err))?;

        let written = write_remote(local, &mut file, &destination, deadline, || self.arm());
        drop(file);
        if let Err(err) = &written {
            self.session.set_timeout(UNLINK_TIMEOUT_MS);
            if let Err(unlink) = sftp.unlink(&destination) {
                debug!(
                    path = %destination.display(),
                    error = %err,
                    unlink_error = %unlink,
                    "partial remote file left in place"
                );
            }
        }
        written
    }

    fn exit_channel(&mut self) -> TransferResult<()> {
        self.arm();
        match self.sftp.as_mut() {
            Some(sftp) => sftp
                .shutdown()
                .map_err(|err| TransferError::ssh("sftp.channel_exit", err)),
            None => Ok(()),
        }
    }

    fn disconnect_channel(&mut self) -> TransferResult<()> {
        self.sftp = None;
        self.remote_dir = None;
        Ok(())
    }

    fn disconnect(&mut self) -> TransferResult<()> {
        self.arm();
        self.session
            .disconnect(None, DISCONNECT_DESCRIPTION, None)
            .map_err(|err| TransferError::ssh("sftp.disconnect", err))
    }
}

/// Remote handle that can be flushed to stable storage and closed with a result.
trait RemoteFile: Write {
    fn fsync(&mut self) -> Result<(), ssh2::Error>;
    fn close(&mut self) -> Result<(), ssh2::Error>;
}

impl RemoteFile for ssh2::File {
    fn fsync(&mut self) -> Result<(), ssh2::Error> {
        ssh2::File::fsync(self)
    }

    fn close(&mut self) -> Result<(), ssh2::Error> {
        ssh2::File::close(self)
    }
}

/// Copy `local` into `file` in chunks, then fsync and close.
///
/// The byte count is returned only after the server acknowledged the close. `rearm` runs
/// before every blocking remote call.
fn write_remote<F: RemoteFile>(
    local: &mut dyn Read,
    file: &mut F,
    destination: &Path,
    deadline: Deadline,
    rearm: impl Fn(),
) -> TransferResult<u64> {
    let mut buffer = vec![0_u8; WRITE_CHUNK];
    let mut written = 0_u64;
    loop {
        deadline.check("sftp.write")?;
        let read = match local.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransferError::io("sftp.read_local", destination, err)),
        };
        rearm();
        file.write_all(&buffer[..read])
            .map_err(|err| TransferError::io("sftp.write", destination, err))?;
        written += read as u64;
    }

    deadline.check("sftp.close")?;
    rearm();
    match file.fsync() {
        Ok(()) => {}
        Err(err) if matches!(err.code(), ErrorCode::SFTP(SFTP_OP_UNSUPPORTED)) => {
            debug!(path = %destination.display(), "server does not support fsync");
        }
        Err(err) => return Err(TransferError::ssh("sftp.fsync", err)),
    }
    rearm();
    file.close()
        .map_err(|err| TransferError::ssh("sftp.close", err))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeRemote {
        bytes: Vec<u8>,
        writes: usize,
        fsync: Option<i32>,
        fail_close: bool,
        closed: bool,
    }

    impl Write for FakeRemote {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RemoteFile for FakeRemote {
        fn fsync(&mut self) -> Result<(), ssh2::Error> {
            match self.fsync {
                Some(code) => Err(ssh2::Error::new(ErrorCode::SFTP(code), "fsync refused")),
                None => Ok(()),
            }
        }

        fn close(&mut self) -> Result<(), ssh2::Error> {
            if self.fail_close {
                return Err(ssh2::Error::new(ErrorCode::SFTP(4), "close failed"));
            }
            self.closed = true;
            Ok(())
        }
    }

    fn destination() -> PathBuf {
        PathBuf::from("/incoming/B1234.zip")
    }

    #[test]
    fn large_input_is_written_in_chunks_then_closed() {
        let body = vec![7_u8; WRITE_CHUNK * 2 + 10];
        let mut remote = FakeRemote::default();
        let rearmed = Cell::new(0_usize);

        let written = write_remote(
            &mut body.as_slice(),
            &mut remote,
            &destination(),
            Deadline::after(Duration::from_secs(5)),
            || rearmed.set(rearmed.get() + 1),
        );

        assert_eq!(written.ok(), Some(body.len() as u64));
        assert_eq!(remote.writes, 3);
        assert_eq!(remote.bytes, body);
        assert!(remote.closed);
        assert_eq!(rearmed.get(), 5);
    }

    #[test]
    fn failed_close_fails_the_put() {
        let mut remote = FakeRemote {
            fail_close: true,
            ..FakeRemote::default()
        };
        let written = write_remote(
            &mut &b"zip-bytes"[..],
            &mut remote,
            &destination(),
            Deadline::after(Duration::from_secs(5)),
            || {},
        );
        assert!(matches!(
            written,
            Err(TransferError::Ssh {
                operation: "sftp.close",
                ..
            })
        ));
        assert_eq!(remote.bytes, b"zip-bytes");
    }

    #[test]
    fn unsupported_fsync_is_tolerated() {
        let mut remote = FakeRemote {
            fsync: Some(SFTP_OP_UNSUPPORTED),
            ..FakeRemote::default()
        };
        let written = write_remote(
            &mut &b"zip"[..],
            &mut remote,
            &destination(),
            Deadline::after(Duration::from_secs(5)),
            || {},
        );
        assert_eq!(written.ok(), Some(3));
        assert!(remote.closed);
    }

    #[test]
    fn fsync_failure_fails_the_put() {
        let mut remote = FakeRemote {
            fsync: Some(4),
            ..FakeRemote::default()
        };
        let written = write_remote(
            &mut &b"zip"[..],
            &mut remote,
            &destination(),
            Deadline::after(Duration::from_secs(5)),
            || {},
        );
        assert!(matches!(
            written,
            Err(TransferError::Ssh {
                operation: "sftp.fsync",
                ..
            })
        ));
        assert!(!remote.closed);
    }

    #[test]
    fn spent_deadline_writes_nothing() {
        let mut remote = FakeRemote::default();
        let written = write_remote(
            &mut &b"zip-bytes"[..],
            &mut remote,
            &destination(),
            Deadline::after(Duration::ZERO),
            || {},
        );
        assert!(matches!(
            written,
            Err(TransferError::Timeout {
                operation: "sftp.write",
                ..
            })
        ));
        assert!(remote.bytes.is_empty());
        assert!(!remote.closed);
    }
}
