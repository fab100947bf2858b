//! In-memory device and operator used by the unit tests

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    io,
    path::{Path, PathBuf},
};

use crate::{CommandOutput, IdbError, Prompt, RemoteSession};

/// Fake remote filesystem plus a log of everything asked of it
#[derive(Debug, Default)]
pub(crate) struct MockSession {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub executed: Vec<String>,
    pub uploads: Vec<(PathBuf, String)>,
    pub downloads: Vec<(String, PathBuf)>,
    /// Number of calls of any kind made against the session
    pub calls: usize,
    /// Commands containing the key create the file in the value
    creates: Vec<(String, String)>,
    /// Commands containing one of these exit with status 1
    failing: Vec<String>,
    /// Files that appear right after the next directory listing
    appearing: Vec<(String, Vec<u8>)>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }

    pub fn add_file(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_dir(parent);
        }
        self.files.insert(path.to_string(), contents.into());
    }

    pub fn remove_file(&mut self, path: &str) {
        self.files.remove(path);
    }

    /// Running a command that contains `needle` creates `path`
    pub fn on_command_create(&mut self, needle: &str, path: &str) {
        self.creates.push((needle.to_string(), path.to_string()));
    }

    /// `path` shows up once the next `list_dir` has returned
    pub fn add_file_after_listing(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.appearing.push((path.to_string(), contents.into()));
    }

    pub fn fail_command(&mut self, needle: &str) {
        self.failing.push(needle.to_string());
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.executed.iter().any(|c| c.contains(needle))
    }

    pub fn count_ran(&self, needle: &str) -> usize {
        self.executed.iter().filter(|c| c.contains(needle)).count()
    }
}

impl RemoteSession for MockSession {
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, IdbError> {
        self.calls += 1;
        self.executed.push(command.to_string());

        let created: Vec<String> = self
            .creates
            .iter()
            .filter(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, path)| path.clone())
            .collect();
        for path in created {
            self.add_file(&path, b"created".to_vec());
        }

        let exit_status = if self.failing.iter().any(|n| command.contains(n.as_str())) {
            1
        } else {
            0
        };
        Ok(CommandOutput {
            exit_status,
            ..Default::default()
        })
    }

    async fn file_exists(&mut self, path: &str) -> Result<bool, IdbError> {
        self.calls += 1;
        let path = path.trim_end_matches('/');
        Ok(self.files.contains_key(path) || self.dirs.contains(path))
    }

    async fn list_dir(&mut self, path: &str) -> Result<Vec<String>, IdbError> {
        self.calls += 1;
        let path = path.trim_end_matches('/');
        if !self.dirs.contains(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()).into());
        }
        let prefix = format!("{path}/");
        let names: BTreeSet<String> = self
            .files
            .keys()
            .chain(self.dirs.iter())
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(String::from)
            .collect();
        for (path, contents) in std::mem::take(&mut self.appearing) {
            self.add_file(&path, contents);
        }
        Ok(names.into_iter().collect())
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), IdbError> {
        self.calls += 1;
        let bytes = tokio::fs::read(local).await?;
        self.uploads.push((local.to_path_buf(), remote.to_string()));
        self.add_file(remote, bytes);
        Ok(())
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<PathBuf, IdbError> {
        self.calls += 1;
        let bytes = self
            .files
            .get(remote)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, remote.to_string()))?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, bytes).await?;
        self.downloads.push((remote.to_string(), local.to_path_buf()));
        Ok(local.to_path_buf())
    }
}

/// Operator with canned answers
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompt {
    pub agrees: VecDeque<bool>,
    pub choices: VecDeque<Option<usize>>,
    pub said: Vec<String>,
    pub asked: Vec<String>,
    pub pauses: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(answers: &[bool]) -> Self {
        Self {
            agrees: answers.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn said_containing(&self, needle: &str) -> bool {
        self.said.iter().any(|s| s.contains(needle))
    }
}

impl Prompt for ScriptedPrompt {
    fn say(&mut self, message: &str) {
        self.said.push(message.to_string());
    }

    async fn pause(&mut self, message: &str) {
        self.pauses.push(message.to_string());
    }

    async fn agree(&mut self, question: &str) -> bool {
        self.asked.push(question.to_string());
        self.agrees.pop_front().unwrap_or(false)
    }

    async fn choose(&mut self, question: &str, _options: &[String]) -> Option<usize> {
        self.asked.push(question.to_string());
        self.choices.pop_front().flatten()
    }
}

/// Local scratch layout rooted in a temporary directory
pub(crate) fn temp_layout(root: &Path) -> crate::LocalLayout {
    crate::LocalLayout::default()
        .with_work_dir(root.join("tmp"))
        .with_utils_dir(root.join("utils"))
        .with_platform_dir(root.join("no-xcode"))
}
