//! Dumping decrypted application binaries
//!
//! dumpdecrypted is injected into the app's binary with `DYLD_INSERT_LIBRARIES`.
//! When the binary is encrypted the library writes `<binary>.decrypted` next to it
//! and kills the process. The output file is the only signal of success; it is
//! looked for once, right after the command returns.

use std::path::PathBuf;

use tracing::debug;

use crate::{
    AppContext, IdbError, LocalLayout, Prompt, RemoteSession,
    install::{self, InstallOutcome, Tool},
    paths::{DUMPDECRYPTED_REMOTE, REMOTE_HOME},
    util::{remote_basename, shell_quote},
};

/// Result of [`decrypt`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// The decrypted binary was downloaded to this local path
    Success(PathBuf),
    /// No decrypted file appeared; the binary is probably not encrypted
    NotEncryptedOrMissing { expected: String },
    /// dumpdecrypted is not on the device and could not be installed
    HelperUnavailable(InstallOutcome),
}

/// Where dumpdecrypted writes the decrypted copy of `binary`
pub fn decrypted_path(binary: &str) -> String {
    format!("{binary}.decrypted")
}

/// Decrypts the selected app's main binary and downloads the result
///
/// Nothing is downloaded and no local file is created when the decrypted file
/// does not show up.
///
/// # Errors
/// `NoAppSelected` before any remote call when no app is selected
pub async fn decrypt<S: RemoteSession, P: Prompt>(
    session: &mut S,
    apps: &mut AppContext,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<DecryptOutcome, IdbError> {
    let app_id = apps.selected()?.id.clone();

    match install::ensure_installed(session, layout, prompt, Tool::Dumpdecrypted).await? {
        InstallOutcome::AlreadyInstalled | InstallOutcome::Installed => {}
        other => return Ok(DecryptOutcome::HelperUnavailable(other)),
    }

    let binary = apps.binary_path(session, layout).await?;
    prompt.say(&format!("[*] Running '{binary}'"));
    let res = session
        .execute(&format!(
            "cd {REMOTE_HOME} && DYLD_INSERT_LIBRARIES={DUMPDECRYPTED_REMOTE} {}",
            shell_quote(&binary)
        ))
        .await?;
    // dumpdecrypted terminates the process, so the status says nothing
    debug!("Decryption run exited with {}", res.exit_status);

    let expected = decrypted_path(&binary);
    prompt.say(&format!(
        "[*] Checking if decrypted file {expected} was created..."
    ));
    if !session.file_exists(&expected).await? {
        prompt.say(
            "[*] Decryption failed. File may not be encrypted. Try 'app download' instead.",
        );
        return Ok(DecryptOutcome::NotEncryptedOrMissing { expected });
    }

    prompt.say("[*] Decrypted file found. Downloading...");
    let local = layout
        .app_dir(&app_id)
        .join(remote_basename(&expected));
    let local = session.download(&expected, &local).await?;
    prompt.say(&format!(
        "[*] Decrypted binary downloaded to {}",
        local.display()
    ));
    Ok(DecryptOutcome::Success(local))
}
