//! The application under test
//!
//! Applications live in one directory per app under [`APPS_ROOT`]. Inside that
//! directory sits the `.app` bundle holding the `Info.plist` and the main binary.

use std::path::PathBuf;

use tracing::debug;

use crate::{
    IdbError, LocalLayout, Prompt, RemoteSession,
    info_plist::AppMetadata,
    install::{self, InstallOutcome, Tool},
    paths::{APPS_ROOT, ARCHIVE_REMOTE},
    util::{remote_basename, remote_join, shell_quote},
};

/// An app picked by the operator, with whatever has been resolved about it so far
#[derive(Clone, Debug)]
pub struct SelectedApp {
    /// Directory name of the app under the apps root
    pub id: String,
    /// Remote directory the app is installed in
    pub install_dir: String,
    bundle_dir: Option<String>,
    metadata: Option<AppMetadata>,
}

impl SelectedApp {
    fn new(id: String) -> Self {
        Self {
            install_dir: remote_join(APPS_ROOT, &id),
            id,
            bundle_dir: None,
            metadata: None,
        }
    }
}

/// Tracks which app the operator is working on
///
/// Everything resolved about the selected app is cached until another app is
/// selected.
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    selected: Option<SelectedApp>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists the identifiers of all installed applications
    ///
    /// # Errors
    /// `DirectoryNotFound` if the device has no applications directory
    pub async fn list_apps<S: RemoteSession>(session: &mut S) -> Result<Vec<String>, IdbError> {
        if !session.file_exists(APPS_ROOT).await? {
            return Err(IdbError::DirectoryNotFound(APPS_ROOT.to_string()));
        }
        let mut apps = session.list_dir(APPS_ROOT).await?;
        apps.retain(|x| x != "." && x != "..");
        apps.sort();
        debug!("Found {} applications in {APPS_ROOT}", apps.len());
        Ok(apps)
    }

    /// Makes `id` the current app, dropping anything cached about the previous one
    pub fn select_app(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.selected.as_ref().is_some_and(|s| s.id == id) {
            return;
        }
        debug!("Selected app {id}");
        self.selected = Some(SelectedApp::new(id));
    }

    /// Selects `id` and resolves its metadata
    ///
    /// When the app cannot be resolved the previous selection is put back.
    pub async fn select_and_resolve<S: RemoteSession>(
        &mut self,
        session: &mut S,
        layout: &LocalLayout,
        id: impl Into<String>,
    ) -> Result<AppMetadata, IdbError> {
        let previous = self.selected.clone();
        self.select_app(id);
        match self.resolve_metadata(session, layout).await {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                debug!("Restoring previous selection after {e}");
                self.selected = previous;
                Err(e)
            }
        }
    }

    /// The current app
    ///
    /// # Errors
    /// `NoAppSelected` until [`AppContext::select_app`] has been called
    pub fn selected(&self) -> Result<&SelectedApp, IdbError> {
        self.selected.as_ref().ok_or(IdbError::NoAppSelected)
    }

    fn selected_mut(&mut self) -> Result<&mut SelectedApp, IdbError> {
        self.selected.as_mut().ok_or(IdbError::NoAppSelected)
    }

    /// Remote directory the selected app is installed in
    pub fn install_dir(&self) -> Result<&str, IdbError> {
        Ok(self.selected()?.install_dir.as_str())
    }

    /// Remote path of the selected app's `.app` bundle
    pub async fn app_bundle_dir<S: RemoteSession>(
        &mut self,
        session: &mut S,
    ) -> Result<String, IdbError> {
        let app = self.selected_mut()?;
        if let Some(dir) = &app.bundle_dir {
            return Ok(dir.clone());
        }

        if !session.file_exists(&app.install_dir).await? {
            return Err(IdbError::DirectoryNotFound(app.install_dir.clone()));
        }
        let bundle = session
            .list_dir(&app.install_dir)
            .await?
            .into_iter()
            .find(|name| name.ends_with(".app"))
            .ok_or_else(|| IdbError::AppBundleNotFound(app.install_dir.clone()))?;
        let dir = remote_join(&app.install_dir, &bundle);
        app.bundle_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Metadata of the selected app, fetched from its `Info.plist` on first use
    ///
    /// The plist is downloaded to the app's scratch directory before parsing.
    pub async fn resolve_metadata<S: RemoteSession>(
        &mut self,
        session: &mut S,
        layout: &LocalLayout,
    ) -> Result<AppMetadata, IdbError> {
        if let Some(metadata) = &self.selected()?.metadata {
            return Ok(metadata.clone());
        }

        let remote_plist = remote_join(&self.app_bundle_dir(session).await?, "Info.plist");
        if !session.file_exists(&remote_plist).await? {
            return Err(IdbError::FileNotFound(remote_plist));
        }

        let app = self.selected_mut()?;
        let local_dir = layout.app_dir(&app.id);
        tokio::fs::create_dir_all(&local_dir).await?;
        let local = session
            .download(&remote_plist, &local_dir.join("Info.plist"))
            .await?;

        let metadata = AppMetadata::from_bytes(&tokio::fs::read(&local).await?)?;
        debug!("Resolved metadata for {}: {metadata:?}", app.id);
        app.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Remote path of the selected app's main executable
    pub async fn binary_path<S: RemoteSession>(
        &mut self,
        session: &mut S,
        layout: &LocalLayout,
    ) -> Result<String, IdbError> {
        let metadata = self.resolve_metadata(session, layout).await?;
        let bundle = self.app_bundle_dir(session).await?;
        Ok(remote_join(&bundle, &metadata.binary_name))
    }
}

/// Packs the selected app's install directory into a tarball and downloads it
///
/// # Returns
/// Local path of the downloaded archive
pub async fn archive<S: RemoteSession, P: Prompt>(
    session: &mut S,
    apps: &AppContext,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<PathBuf, IdbError> {
    let app = apps.selected()?;
    prompt.say(&format!(
        "[*] Creating tar.gz of {}. This may take a while...",
        app.install_dir
    ));
    // an archive left over from an earlier run must never be downloaded
    session.execute(&format!("/bin/rm -f {ARCHIVE_REMOTE}")).await?;
    let command = format!(
        "/usr/bin/tar cfz {ARCHIVE_REMOTE} {}",
        shell_quote(&app.install_dir)
    );
    let res = session.execute(&command).await?;
    if !res.success() {
        debug!("tar exited with {}: {}", res.exit_status, res.stderr.trim());
        return Err(IdbError::CommandFailed {
            command,
            exit_status: res.exit_status,
        });
    }

    prompt.say("[*] Downloading app archive...");
    let local = session
        .download(
            ARCHIVE_REMOTE,
            &layout.app_dir(&app.id).join("app_archive.tar.gz"),
        )
        .await?;
    prompt.say(&format!("[*] App archive downloaded to {}.", local.display()));
    Ok(local)
}

/// Downloads the selected app's main binary as it is on the device
///
/// The binary is not decrypted. Useful for apps that are not encrypted.
///
/// # Returns
/// Local path of the downloaded binary
pub async fn download_binary<S: RemoteSession, P: Prompt>(
    session: &mut S,
    apps: &mut AppContext,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<PathBuf, IdbError> {
    let app_id = apps.selected()?.id.clone();
    let binary = apps.binary_path(session, layout).await?;
    if !session.file_exists(&binary).await? {
        return Err(IdbError::FileNotFound(binary));
    }

    prompt.say(&format!("[*] Downloading {binary}..."));
    let local = layout.app_dir(&app_id).join(remote_basename(&binary));
    let local = session.download(&binary, &local).await?;
    prompt.say(&format!("[*] Binary downloaded to {}.", local.display()));
    Ok(local)
}

/// Launches the selected app on the device with the `open` utility
///
/// Installs `open` first when it is missing.
///
/// # Returns
/// `false` when `open` is unavailable and nothing was launched
pub async fn launch<S: RemoteSession, P: Prompt>(
    session: &mut S,
    apps: &mut AppContext,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<bool, IdbError> {
    apps.selected()?;
    match install::ensure_installed(session, layout, prompt, Tool::Open).await? {
        InstallOutcome::AlreadyInstalled | InstallOutcome::Installed => {}
        _ => return Ok(false),
    }

    let metadata = apps.resolve_metadata(session, layout).await?;
    prompt.say("[*] Launching app...");
    session
        .launch_app("open", &metadata.bundle_identifier)
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSession, ScriptedPrompt, temp_layout};

    const PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict>
<key>CFBundleExecutable</key><string>Bank</string>
<key>CFBundleIdentifier</key><string>com.example.bank</string>
</dict></plist>"#;

    fn device_with_app(id: &str) -> MockSession {
        let mut session = MockSession::new();
        let bundle = format!("{APPS_ROOT}/{id}/Bank.app");
        session.add_file(&format!("{bundle}/Info.plist"), PLIST);
        session.add_file(&format!("{bundle}/Bank"), b"\xca\xfe".to_vec());
        session.add_dir(&format!("{APPS_ROOT}/{id}/Documents"));
        session
    }

    #[tokio::test]
    async fn list_apps_without_root_is_directory_not_found() {
        let mut session = MockSession::new();
        let res = AppContext::list_apps(&mut session).await;
        assert!(matches!(res, Err(IdbError::DirectoryNotFound(p)) if p == APPS_ROOT));
    }

    #[tokio::test]
    async fn list_apps_returns_directory_names() {
        let mut session = device_with_app("BBB");
        session.add_dir(&format!("{APPS_ROOT}/AAA"));
        let apps = AppContext::list_apps(&mut session).await.unwrap();
        assert_eq!(apps, vec!["AAA".to_string(), "BBB".to_string()]);
    }

    #[tokio::test]
    async fn app_scoped_calls_need_a_selection() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();
        let mut prompt = ScriptedPrompt::new();

        assert!(matches!(apps.install_dir(), Err(IdbError::NoAppSelected)));
        assert!(matches!(
            apps.resolve_metadata(&mut session, &layout).await,
            Err(IdbError::NoAppSelected)
        ));
        assert!(matches!(
            archive(&mut session, &apps, &layout, &mut prompt).await,
            Err(IdbError::NoAppSelected)
        ));
        assert!(matches!(
            launch(&mut session, &mut apps, &layout, &mut prompt).await,
            Err(IdbError::NoAppSelected)
        ));
        assert_eq!(session.calls, 0);
    }

    #[tokio::test]
    async fn metadata_is_cached_until_another_app_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();
        apps.select_app("A1");

        let meta = apps.resolve_metadata(&mut session, &layout).await.unwrap();
        assert_eq!(meta.binary_name, "Bank");
        assert!(layout.app_dir("A1").join("Info.plist").exists());
        assert_eq!(
            apps.binary_path(&mut session, &layout).await.unwrap(),
            format!("{APPS_ROOT}/A1/Bank.app/Bank")
        );
        assert_eq!(session.downloads.len(), 1);

        // same app again keeps the cache
        apps.select_app("A1");
        apps.resolve_metadata(&mut session, &layout).await.unwrap();
        assert_eq!(session.downloads.len(), 1);

        session.add_file(&format!("{APPS_ROOT}/A2/Bank.app/Info.plist"), PLIST);
        apps.select_app("A2");
        apps.resolve_metadata(&mut session, &layout).await.unwrap();
        assert_eq!(session.downloads.len(), 2);
    }

    #[tokio::test]
    async fn missing_bundle_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = MockSession::new();
        session.add_dir(&format!("{APPS_ROOT}/A1/Documents"));
        let mut apps = AppContext::new();
        apps.select_app("A1");
        assert!(matches!(
            apps.resolve_metadata(&mut session, &layout).await,
            Err(IdbError::AppBundleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn archive_downloads_tarball_into_app_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        session.on_command_create("/usr/bin/tar cfz", ARCHIVE_REMOTE);
        let mut apps = AppContext::new();
        apps.select_app("A1");
        let mut prompt = ScriptedPrompt::new();

        let local = archive(&mut session, &apps, &layout, &mut prompt)
            .await
            .unwrap();
        assert_eq!(local, layout.app_dir("A1").join("app_archive.tar.gz"));
        assert!(local.exists());
        assert!(session.ran(&format!("{APPS_ROOT}/A1")));
    }

    #[tokio::test]
    async fn unknown_app_is_directory_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();
        apps.select_app("TYPO");

        let err = apps
            .resolve_metadata(&mut session, &layout)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, IdbError::DirectoryNotFound(p) if p == &format!("{APPS_ROOT}/TYPO"))
        );
        assert!(!err.is_connectivity());
    }

    #[tokio::test]
    async fn failed_selection_keeps_the_previous_app() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();

        let meta = apps
            .select_and_resolve(&mut session, &layout, "A1")
            .await
            .unwrap();
        assert_eq!(meta.bundle_identifier, "com.example.bank");

        assert!(matches!(
            apps.select_and_resolve(&mut session, &layout, "TYPO").await,
            Err(IdbError::DirectoryNotFound(_))
        ));
        assert_eq!(apps.selected().unwrap().id, "A1");
        // the cache of the previous app survives
        apps.resolve_metadata(&mut session, &layout).await.unwrap();
        assert_eq!(session.downloads.len(), 1);

        let mut fresh = AppContext::new();
        assert!(
            fresh
                .select_and_resolve(&mut session, &layout, "TYPO")
                .await
                .is_err()
        );
        assert!(matches!(fresh.selected(), Err(IdbError::NoAppSelected)));
    }

    #[tokio::test]
    async fn failing_tar_does_not_download_a_stale_archive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("B1");
        session.add_file(ARCHIVE_REMOTE, b"archive of app A".to_vec());
        session.fail_command("/usr/bin/tar");
        let mut apps = AppContext::new();
        apps.select_app("B1");
        let mut prompt = ScriptedPrompt::new();

        let res = archive(&mut session, &apps, &layout, &mut prompt).await;
        assert!(matches!(
            res,
            Err(IdbError::CommandFailed { exit_status: 1, .. })
        ));
        assert!(session.ran(&format!("/bin/rm -f {ARCHIVE_REMOTE}")));
        assert!(session.downloads.is_empty());
        assert!(!layout.app_dir("B1").join("app_archive.tar.gz").exists());
    }

    #[tokio::test]
    async fn binary_is_downloaded_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();
        apps.select_app("A1");
        let mut prompt = ScriptedPrompt::new();

        let local = download_binary(&mut session, &mut apps, &layout, &mut prompt)
            .await
            .unwrap();
        assert_eq!(local, layout.app_dir("A1").join("Bank"));
        assert_eq!(std::fs::read(&local).unwrap(), b"\xca\xfe");
        assert!(session.executed.is_empty());
    }

    #[tokio::test]
    async fn binary_download_needs_a_selection() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();
        let mut prompt = ScriptedPrompt::new();

        assert!(matches!(
            download_binary(&mut session, &mut apps, &layout, &mut prompt).await,
            Err(IdbError::NoAppSelected)
        ));
        assert_eq!(session.calls, 0);
    }

    #[tokio::test]
    async fn launch_uses_open_with_bundle_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        session.add_file(crate::paths::OPEN_BINARY, b"".to_vec());
        let mut apps = AppContext::new();
        apps.select_app("A1");
        let mut prompt = ScriptedPrompt::new();

        assert!(launch(&mut session, &mut apps, &layout, &mut prompt).await.unwrap());
        assert!(session.ran("open com.example.bank"));
    }

    #[tokio::test]
    async fn launch_without_package_manager_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        let mut session = device_with_app("A1");
        let mut apps = AppContext::new();
        apps.select_app("A1");
        let mut prompt = ScriptedPrompt::new();

        assert!(!launch(&mut session, &mut apps, &layout, &mut prompt).await.unwrap());
        assert!(session.executed.is_empty());
    }
}
