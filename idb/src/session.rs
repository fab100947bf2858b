//! The remote shell the rest of the crate drives the device through

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use crate::IdbError;

/// Output of a command run on the device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status reported by the remote shell
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// A session to one device, able to run commands and move files
///
/// Implementations do not retry. Any failure to reach the device is returned as an
/// [`IdbError`] for which [`IdbError::is_connectivity`] holds.
pub trait RemoteSession: Send {
    /// Runs a shell command on the device and waits for it to exit
    fn execute(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<CommandOutput, IdbError>> + Send;

    /// Checks whether anything exists at `path`
    fn file_exists(&mut self, path: &str) -> impl Future<Output = Result<bool, IdbError>> + Send;

    /// Lists the entry names in a directory, without `.` and `..`
    fn list_dir(
        &mut self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<String>, IdbError>> + Send;

    /// Copies a local file to the device
    fn upload(
        &mut self,
        local: &Path,
        remote: &str,
    ) -> impl Future<Output = Result<(), IdbError>> + Send;

    /// Copies a remote file to `local`, creating parent directories as needed
    ///
    /// # Returns
    /// The local path the file was written to
    fn download(
        &mut self,
        remote: &str,
        local: &Path,
    ) -> impl Future<Output = Result<PathBuf, IdbError>> + Send;

    /// Launches an app on the device using a launcher binary such as `open`
    fn launch_app(
        &mut self,
        method: &str,
        bundle_id: &str,
    ) -> impl Future<Output = Result<CommandOutput, IdbError>> + Send {
        let command = format!("{method} {}", crate::shell_quote(bundle_id));
        async move { self.execute(&command).await }
    }
}
