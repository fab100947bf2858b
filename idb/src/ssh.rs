//! [`RemoteSession`] over SSH
//!
//! libssh2 is blocking, so every call runs on tokio's blocking pool. Calls are
//! still made one at a time by the callers of this crate.

use std::{
    fs,
    io::{self, Read},
    net::TcpStream,
    path::{Path, PathBuf},
    time::Duration,
};

use ssh2::Session;
use tracing::{debug, trace};

use crate::{CommandOutput, IdbError, RemoteSession};

/// How to reach the device's SSH server
#[derive(Clone, Debug)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
}

impl SshConfig {
    pub fn new(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: "root".into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// An authenticated SSH session to the device
pub struct SshSession {
    session: Session,
    label: String,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("label", &self.label)
            .finish()
    }
}

impl SshSession {
    /// Connects and authenticates with the configured password
    pub async fn connect(config: SshConfig) -> Result<Self, IdbError> {
        tokio::task::spawn_blocking(move || Self::connect_blocking(&config)).await?
    }

    fn connect_blocking(config: &SshConfig) -> Result<Self, IdbError> {
        let label = format!("{}@{}:{}", config.username, config.host, config.port);
        debug!("Connecting to {label}");

        let addr = std::net::ToSocketAddrs::to_socket_addrs(&(config.host.as_str(), config.port))?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {}", config.host))
            })?;
        let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&config.username, &config.password)?;
        if !session.authenticated() {
            return Err(IdbError::AuthenticationFailed(label));
        }
        session.set_keepalive(true, 30);

        debug!("Connected to {label}");
        Ok(Self { session, label })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Runs `f` against a handle to the session on the blocking pool
async fn blocking<F, T>(session: Session, f: F) -> Result<T, IdbError>
where
    F: FnOnce(&Session) -> Result<T, IdbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&session)).await?
}

/// SFTP stat, with a missing file mapped to `None`
fn stat_optional(sftp: &ssh2::Sftp, path: &Path) -> Result<Option<ssh2::FileStat>, IdbError> {
    match sftp.stat(path) {
        Ok(stat) => Ok(Some(stat)),
        Err(err) => {
            let io_err: io::Error = err.into();
            if io_err.kind() == io::ErrorKind::NotFound {
                Ok(None)
            } else {
                Err(io_err.into())
            }
        }
    }
}

/// Reads stdout and stderr side by side until `eof` reports the remote end is done
///
/// Expects non-blocking streams. Reading one stream to the end first stalls once
/// the other fills the channel window.
fn drain_output<O: Read, E: Read>(
    stdout: &mut O,
    stderr: &mut E,
    eof: impl Fn() -> bool,
) -> Result<(Vec<u8>, Vec<u8>), IdbError> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let progressed = read_available(stdout, &mut buf, &mut out)?
            | read_available(stderr, &mut buf, &mut err)?;
        if !progressed {
            if eof() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
    Ok((out, err))
}

/// One non-blocking read into `sink`, true when bytes arrived
fn read_available<R: Read>(
    stream: &mut R,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
) -> Result<bool, IdbError> {
    match stream.read(buf) {
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(n > 0)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl RemoteSession for SshSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, IdbError> {
        trace!("exec `{command}`");
        let command = command.to_string();
        blocking(self.session.clone(), move |session| {
            let mut channel = session.channel_session()?;
            channel.exec(&command)?;

            session.set_blocking(false);
            let drained = drain_output(&mut channel.stream(0), &mut channel.stderr(), || {
                channel.eof()
            });
            session.set_blocking(true);
            let (stdout, stderr) = drained?;

            channel.wait_close()?;
            let exit_status = channel.exit_status()?;
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_status,
            })
        })
        .await
    }

    async fn file_exists(&mut self, path: &str) -> Result<bool, IdbError> {
        let path = PathBuf::from(path);
        blocking(self.session.clone(), move |session| {
            let sftp = session.sftp()?;
            Ok(stat_optional(&sftp, &path)?.is_some())
        })
        .await
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<String>, IdbError> {
        let path = PathBuf::from(path);
        blocking(self.session.clone(), move |session| {
            let sftp = session.sftp()?;
            let entries = sftp.readdir(&path)?;
            Ok(entries
                .into_iter()
                .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .filter(|n| n != "." && n != "..")
                .collect())
        })
        .await
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), IdbError> {
        debug!("Uploading {} to {remote}", local.display());
        let local = local.to_path_buf();
        let remote = PathBuf::from(remote);
        blocking(self.session.clone(), move |session| {
            let mut local_file = fs::File::open(&local)?;
            let sftp = session.sftp()?;
            let mut remote_file = sftp.create(&remote)?;
            let written = io::copy(&mut local_file, &mut remote_file)?;
            trace!("Wrote {written} bytes");
            Ok(())
        })
        .await
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<PathBuf, IdbError> {
        debug!("Downloading {remote} to {}", local.display());
        let local = local.to_path_buf();
        let remote = PathBuf::from(remote);
        blocking(self.session.clone(), move |session| {
            let sftp = session.sftp()?;
            let mut remote_file = sftp.open(&remote)?;
            if let Some(parent) = local.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut local_file = fs::File::create(&local)?;
            let read = io::copy(&mut remote_file, &mut local_file)?;
            trace!("Read {read} bytes");
            Ok(local)
        })
        .await
    }
}
