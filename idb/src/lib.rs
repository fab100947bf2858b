//! Operations against a jailbroken iOS device reached over a remote shell.
//!
//! The crate is split the same way the device work is split: [`app`] selects and
//! describes the application under test, [`install`] puts auxiliary tooling on the
//! device, [`decrypt`] dumps decrypted binaries and [`screenshot`] detects files that
//! appear while the operator interacts with the device. All of them talk to the
//! device through a [`session::RemoteSession`].

pub mod app;
pub mod command;
pub mod decrypt;
pub mod info_plist;
pub mod install;
pub mod paths;
pub mod prompt;
pub mod screenshot;
pub mod session;
#[cfg(feature = "ssh")]
pub mod ssh;
mod util;

#[cfg(test)]
mod testing;

pub use app::{AppContext, SelectedApp};
pub use command::{AppCommand, Command, CommandError};
pub use decrypt::DecryptOutcome;
pub use info_plist::AppMetadata;
pub use install::{InstallFailure, InstallOutcome, Tool};
pub use paths::LocalLayout;
pub use prompt::Prompt;
pub use screenshot::{ScreenshotWatcher, SnapshotDiff};
pub use session::{CommandOutput, RemoteSession};
pub use util::shell_quote;

use std::io;
use thiserror::Error;

/// Error type for everything that can go wrong while talking to the device
///
/// Outcomes that the operator is expected to act on (a tool that could not be
/// installed, a binary that did not decrypt) are not errors; they are reported
/// through [`InstallOutcome`] and [`DecryptOutcome`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IdbError {
    #[error("remote session io failed")]
    Socket(#[from] io::Error),

    #[cfg(feature = "ssh")]
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("remote session task failed")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("ssh authentication failed for {0}")]
    AuthenticationFailed(String),

    #[error("io on plist")]
    Plist(#[from] plist::Error),

    #[error("no app selected")]
    NoAppSelected,

    #[error("directory {0} not found")]
    DirectoryNotFound(String),

    #[error("remote file {0} not found")]
    FileNotFound(String),

    #[error("no .app bundle found in {0}")]
    AppBundleNotFound(String),

    #[error("Info.plist is missing {0}")]
    MissingPlistKey(&'static str),

    #[error("no snapshot taken, call mark first")]
    NotMarked,

    #[error("`{command}` exited with status {exit_status}")]
    CommandFailed { command: String, exit_status: i32 },
}

impl IdbError {
    /// True when the error means the session could not run a command or move a file
    ///
    /// These are fatal to the current operation but not to the process.
    pub fn is_connectivity(&self) -> bool {
        match self {
            IdbError::Socket(_) | IdbError::TaskFailed(_) | IdbError::AuthenticationFailed(_) => {
                true
            }
            #[cfg(feature = "ssh")]
            IdbError::Ssh(_) => true,
            _ => false,
        }
    }
}
