//! Screenshot capture by directory diffing
//!
//! iOS writes a snapshot of an app's screen into the app's directory when the app
//! is sent to the background. The watcher lists a directory before the operator
//! does that and again afterwards; whatever is new is the screenshot. Nothing polls
//! in the background, [`ScreenshotWatcher::check`] is called once when the operator
//! says they are done.

use std::{collections::BTreeSet, path::PathBuf};

use tracing::debug;

use crate::{AppContext, IdbError, LocalLayout, Prompt, RemoteSession, util::remote_join};

/// Difference between the baseline and the current listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotDiff {
    Unchanged,
    /// Exactly one new entry
    Created(String),
    /// Several new entries, sorted by name
    Ambiguous(Vec<String>),
}

impl SnapshotDiff {
    fn from_new(mut new: Vec<String>) -> Self {
        match new.len() {
            0 => SnapshotDiff::Unchanged,
            1 => SnapshotDiff::Created(new.remove(0)),
            _ => {
                new.sort();
                SnapshotDiff::Ambiguous(new)
            }
        }
    }
}

/// Detects entries that appear in one remote directory
#[derive(Debug)]
pub struct ScreenshotWatcher {
    dir: String,
    baseline: Option<BTreeSet<String>>,
}

impl ScreenshotWatcher {
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            baseline: None,
        }
    }

    /// Watches the selected app's install directory
    pub fn for_app(apps: &AppContext) -> Result<Self, IdbError> {
        Ok(Self::new(apps.install_dir()?))
    }

    /// Remote path of an entry reported by [`ScreenshotWatcher::check`]
    pub fn remote_path(&self, name: &str) -> String {
        remote_join(&self.dir, name)
    }

    /// Records the current listing as the baseline
    pub async fn mark<S: RemoteSession>(&mut self, session: &mut S) -> Result<(), IdbError> {
        let names: BTreeSet<String> = session.list_dir(&self.dir).await?.into_iter().collect();
        debug!("Marked {} entries in {}", names.len(), self.dir);
        self.baseline = Some(names);
        Ok(())
    }

    /// Lists the directory again and reports what is new since [`ScreenshotWatcher::mark`]
    ///
    /// Entries that disappeared are ignored.
    ///
    /// # Errors
    /// `NotMarked` when no baseline was taken
    pub async fn check<S: RemoteSession>(&self, session: &mut S) -> Result<SnapshotDiff, IdbError> {
        let baseline = self.baseline.as_ref().ok_or(IdbError::NotMarked)?;
        let new: Vec<String> = session
            .list_dir(&self.dir)
            .await?
            .into_iter()
            .filter(|name| !baseline.contains(name))
            .collect();
        debug!("{} new entries in {}", new.len(), self.dir);
        Ok(SnapshotDiff::from_new(new))
    }
}

/// Walks the operator through taking a screenshot of the selected app
///
/// # Returns
/// The local path when a screenshot was found and the operator chose to download it
pub async fn capture<S: RemoteSession, P: Prompt>(
    session: &mut S,
    apps: &AppContext,
    layout: &LocalLayout,
    prompt: &mut P,
) -> Result<Option<PathBuf>, IdbError> {
    let app_id = apps.selected()?.id.clone();
    let mut watcher = ScreenshotWatcher::for_app(apps)?;

    watcher.mark(session).await?;
    prompt
        .pause("Launch the app on the device. [press enter to continue]")
        .await;
    prompt
        .pause("Now place the app into the background (hit the home button). [press enter to continue]")
        .await;

    let name = match watcher.check(session).await? {
        SnapshotDiff::Unchanged => {
            prompt.say("No screen shot found");
            return Ok(None);
        }
        SnapshotDiff::Created(name) => name,
        SnapshotDiff::Ambiguous(names) => {
            match prompt
                .choose("Several new files appeared, which one is the screen shot?", &names)
                .await
                .and_then(|i| names.get(i).cloned())
            {
                Some(name) => name,
                None => return Ok(None),
            }
        }
    };

    let remote = watcher.remote_path(&name);
    prompt.say("New screen shot found:");
    prompt.say(&remote);
    if !prompt
        .agree("Do you want to download and view it? (y/n)")
        .await
    {
        return Ok(None);
    }

    let local = session
        .download(&remote, &layout.app_dir(&app_id).join(&name))
        .await?;
    Ok(Some(local))
}
