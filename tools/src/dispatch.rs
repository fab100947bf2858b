// Routes parsed commands to the device operations

use std::path::Path;

use idb::{
    AppCommand, AppContext, Command, DecryptOutcome, IdbError, InstallOutcome, LocalLayout,
    Prompt, RemoteSession, app, decrypt, install, screenshot,
};
use tracing::warn;

/// What the loop should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
    /// The device is rebooting, the session is gone
    Terminate,
}

/// Everything a command may touch
pub struct Device<S: RemoteSession> {
    pub session: S,
    pub apps: AppContext,
    pub layout: LocalLayout,
}

pub async fn dispatch<S: RemoteSession, P: Prompt>(
    device: &mut Device<S>,
    prompt: &mut P,
    command: Command,
) -> Result<Flow, IdbError> {
    let Device {
        session,
        apps,
        layout,
    } = device;

    match command {
        Command::Install(tool) => {
            match install::ensure_installed(session, layout, prompt, tool).await? {
                InstallOutcome::AlreadyInstalled => println!("{tool} is already installed."),
                InstallOutcome::Installed => println!("{tool} installed."),
                InstallOutcome::Rebooting => {
                    println!("[*] idb exiting.");
                    return Ok(Flow::Terminate);
                }
                InstallOutcome::Failed(reason) => eprintln!("Installing {tool} failed: {reason}"),
            }
        }
        Command::Screenshot => {
            if let Some(local) = screenshot::capture(session, apps, layout, prompt).await? {
                open_locally(&local).await;
            }
        }
        Command::App(AppCommand::List) => {
            println!("[*] Retrieving list of applications...");
            let ids = AppContext::list_apps(session).await?;
            if ids.is_empty() {
                println!("No applications found.");
            }
            for id in ids {
                println!("{id}");
            }
        }
        Command::App(AppCommand::Select(id)) => {
            let metadata = apps.select_and_resolve(session, layout, id).await?;
            println!(
                "Selected {} ({})",
                metadata
                    .display_name
                    .as_deref()
                    .unwrap_or(&metadata.binary_name),
                metadata.bundle_identifier
            );
        }
        Command::App(AppCommand::Info) => {
            let metadata = apps.resolve_metadata(session, layout).await?;
            println!("Install dir:     {}", apps.install_dir()?);
            println!("Bundle id:       {}", metadata.bundle_identifier);
            println!("Binary:          {}", metadata.binary_name);
            if let Some(name) = &metadata.display_name {
                println!("Display name:    {name}");
            }
            if let Some(version) = &metadata.version {
                println!("Version:         {version}");
            }
            if let Some(min_os) = &metadata.minimum_os_version {
                println!("Minimum iOS:     {min_os}");
            }
        }
        Command::App(AppCommand::Decrypt) => {
            match decrypt::decrypt(session, apps, layout, prompt).await? {
                DecryptOutcome::Success(_) => {}
                DecryptOutcome::NotEncryptedOrMissing { expected } => {
                    warn!("{expected} was not created");
                }
                DecryptOutcome::HelperUnavailable(InstallOutcome::Failed(reason)) => {
                    eprintln!("dumpdecrypted is not available: {reason}");
                }
                DecryptOutcome::HelperUnavailable(InstallOutcome::Rebooting) => {
                    println!("[*] idb exiting.");
                    return Ok(Flow::Terminate);
                }
                DecryptOutcome::HelperUnavailable(_) => {
                    eprintln!("dumpdecrypted is not available.");
                }
            }
        }
        Command::App(AppCommand::Download) => {
            app::download_binary(session, apps, layout, prompt).await?;
        }
        Command::App(AppCommand::Archive) => {
            app::archive(session, apps, layout, prompt).await?;
        }
        Command::App(AppCommand::Launch) => {
            if !app::launch(session, apps, layout, prompt).await? {
                eprintln!("Unable to launch the app without 'open'.");
            }
        }
        Command::Help => {
            for line in Command::usage() {
                println!("  {line}");
            }
        }
        Command::Exit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}

/// Opens a downloaded file with the desktop's default handler
async fn open_locally(path: &Path) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    match tokio::process::Command::new(opener).arg(path).status().await {
        Ok(s) if s.success() => {}
        Ok(s) => warn!("{opener} exited with {s}"),
        Err(e) => eprintln!("Unable to open {}: {e}", path.display()),
    }
}
