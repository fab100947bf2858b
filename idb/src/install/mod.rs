//! Installation of auxiliary tooling on the device
//!
//! Whether a tool is installed is never remembered locally. Each tool has a marker
//! path on the device and the tool counts as installed exactly when that path
//! exists, so every check goes back to the device. An install is only attempted
//! when the marker is missing, which makes [`ensure_installed`] idempotent.
//!
//! Install steps are trusted on their exit status. The marker is not checked again
//! afterwards.

mod toolchain;

use std::{fmt, str::FromStr};

use tracing::{debug, info, warn};

pub use toolchain::{ToolchainError, compile_dumpdecrypted};

use crate::{
    IdbError, LocalLayout, Prompt, RemoteSession,
    paths::{
        APT_GET, DPKG, DUMPDECRYPTED_REMOTE, KILLSWITCH_MARKER, KILLSWITCH_REMOTE_DEB,
        OPEN_BINARY, OPEN_PACKAGE,
    },
};

/// Tooling this crate knows how to put on a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    /// iOS SSL Kill Switch, disables certificate validation system wide
    Killswitch,
    /// Library that dumps the decrypted image of the process it is injected into
    Dumpdecrypted,
    /// Command line app launcher
    Open,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Killswitch, Tool::Dumpdecrypted, Tool::Open];

    /// Remote path whose presence means the tool is installed
    pub fn marker(&self) -> &'static str {
        match self {
            Tool::Killswitch => KILLSWITCH_MARKER,
            Tool::Dumpdecrypted => DUMPDECRYPTED_REMOTE,
            Tool::Open => OPEN_BINARY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Killswitch => "killswitch",
            Tool::Dumpdecrypted => "dumpdecrypted",
            Tool::Open => "open",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL.into_iter().find(|t| t.name() == s).ok_or(())
    }
}

/// Why an install did not happen
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallFailure {
    /// dumpdecrypted is not compiled and could not be compiled here
    ToolchainUnavailable,
    /// The device has no apt-get
    PackageManagerUnavailable,
    /// The local package artifact is missing
    ArtifactMissing(String),
    /// An install command exited with a non-zero status
    CommandFailed { command: String, exit_status: i32 },
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallFailure::ToolchainUnavailable => f.write_str("toolchain unavailable"),
            InstallFailure::PackageManagerUnavailable => {
                f.write_str("package manager unavailable")
            }
            InstallFailure::ArtifactMissing(path) => write!(f, "artifact {path} missing"),
            InstallFailure::CommandFailed {
                command,
                exit_status,
            } => write!(f, "`{command}` exited with status {exit_status}"),
        }
    }
}

/// Result of [`ensure_installed`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The marker was already present, nothing was done
    AlreadyInstalled,
    Installed,
    /// Installed, and the operator asked for a reboot which has been issued
    ///
    /// The session is unusable from here on and the caller is expected to exit.
    Rebooting,
    Failed(InstallFailure),
}

/// Checks the tool's marker on the device
pub async fn is_installed<S: RemoteSession>(session: &mut S, tool: Tool) -> Result<bool, IdbError> {
    session.file_exists(tool.marker()).await
}

/// Installs `tool` unless its marker is already present
///
/// # Errors
/// Only connectivity problems are returned as errors. Missing preconditions and
/// failing install commands are reported as [`InstallOutcome::Failed`].
pub async fn ensure_installed<S: RemoteSession, P: Prompt>(
    session: &mut S,
    layout: &LocalLayout,
    prompt: &mut P,
    tool: Tool,
) -> Result<InstallOutcome, IdbError> {
    prompt.say(&format!("[*] Checking if {tool} is installed..."));
    if is_installed(session, tool).await? {
        prompt.say(&format!("[*] {tool} found."));
        return Ok(InstallOutcome::AlreadyInstalled);
    }
    prompt.say(&format!("[*] {tool} not found. Installing..."));

    let outcome = match tool {
        Tool::Killswitch => install_killswitch(session, layout, prompt).await?,
        Tool::Dumpdecrypted => install_dumpdecrypted(session, layout, prompt).await?,
        Tool::Open => install_open(session, prompt).await?,
    };
    if let InstallOutcome::Failed(reason) = &outcome {
        warn!("Installing {tool} failed: {reason}");
    }
    Ok(outcome)
}

/// Runs an install step, turning a non-zero exit into a failure
async fn run_step<S: RemoteSession>(
    session: &mut S,
    command: &str,
) -> Result<Option<InstallFailure>, IdbError> {
    debug!("Running install step `{command}`");
    let res = session.execute(command).await?;
    if res.success() {
        Ok(None)
    } else {
        debug!("`{command}` failed: {}", res.stderr.trim());
        Ok(Some(InstallFailure::CommandFailed {
            command: command.to_string(),
            exit_status: res.exit_status,
        }))
    }
}

async fn install_killswitch<S: RemoteSession, P: Prompt>(
    session: &mut S,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<InstallOutcome, IdbError> {
    let deb = layout.killswitch_deb();
    if !tokio::fs::try_exists(&deb).await.unwrap_or(false) {
        prompt.say(&format!("[**] Error: {} not found.", deb.display()));
        return Ok(InstallOutcome::Failed(InstallFailure::ArtifactMissing(
            deb.display().to_string(),
        )));
    }

    prompt.say("[*] Uploading Debian package...");
    session.upload(&deb, KILLSWITCH_REMOTE_DEB).await?;

    prompt.say("[*] Installing Debian package...");
    let dpkg = format!("{DPKG} -i {KILLSWITCH_REMOTE_DEB}");
    if let Some(failure) = run_step(session, &dpkg).await? {
        return Ok(InstallOutcome::Failed(failure));
    }

    prompt.say("[*] Restarting SpringBoard...");
    if let Some(failure) = run_step(session, "killall -HUP SpringBoard").await? {
        return Ok(InstallOutcome::Failed(failure));
    }

    prompt.say("[*] iOS SSL Killswitch installed successfully.");
    prompt.say("[**] NOTE: If you need to intercept system applications you should reboot the device.");
    if prompt.agree("Reboot now? (y/n)").await {
        prompt.say("[*] Rebooting now. Please wait.");
        // the connection usually drops before the command returns
        if let Err(e) = session.execute("/sbin/reboot").await {
            debug!("Reboot command did not return cleanly: {e}");
        }
        return Ok(InstallOutcome::Rebooting);
    }
    Ok(InstallOutcome::Installed)
}

async fn install_dumpdecrypted<S: RemoteSession, P: Prompt>(
    session: &mut S,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<InstallOutcome, IdbError> {
    let library = layout.dumpdecrypted_library();
    if !tokio::fs::try_exists(&library).await.unwrap_or(false) {
        prompt.say("[**] Warning: dumpdecrypted not compiled.");
        prompt.say("[**] Due to licensing issue we cannot ship the compiled library with this tool.");
        prompt.say("[**] Attempting compilation (requires a valid iOS SDK installation)...");

        let source_dir = layout.dumpdecrypted_dir();
        if let Err(e) = compile_dumpdecrypted(&layout.platform_dir, &source_dir).await {
            prompt.say(&format!("[**] Error: {e}"));
        }

        if !tokio::fs::try_exists(&library).await.unwrap_or(false) {
            prompt.say("[**] Error: Compilation failed.");
            prompt.say(&format!(
                "[**] Change into the {} directory, adjust the makefile, and compile.",
                layout.dumpdecrypted_dir().display()
            ));
            return Ok(InstallOutcome::Failed(InstallFailure::ToolchainUnavailable));
        }
        prompt.say("[**] Compilation successful.");
    }

    prompt.say("[*] Uploading dumpdecrypted library...");
    session.upload(&library, DUMPDECRYPTED_REMOTE).await?;
    info!("dumpdecrypted uploaded to {DUMPDECRYPTED_REMOTE}");
    prompt.say("[*] 'dumpdecrypted' installed successfully.");
    Ok(InstallOutcome::Installed)
}

async fn install_open<S: RemoteSession, P: Prompt>(
    session: &mut S,
    prompt: &mut P,
) -> Result<InstallOutcome, IdbError> {
    prompt.say("[*] Checking if apt-get is installed...");
    if !session.file_exists(APT_GET).await? {
        prompt.say("[*] Apt-get not available. Aborting.");
        return Ok(InstallOutcome::Failed(
            InstallFailure::PackageManagerUnavailable,
        ));
    }

    prompt.say("[*] Installing open...");
    if let Some(failure) = run_step(session, &format!("{APT_GET} update")).await? {
        return Ok(InstallOutcome::Failed(failure));
    }
    let install = format!("{APT_GET} -y install {OPEN_PACKAGE}");
    if let Some(failure) = run_step(session, &install).await? {
        return Ok(InstallOutcome::Failed(failure));
    }
    Ok(InstallOutcome::Installed)
}
