//! In-memory fakes for the repository host traits (testing only)
//!
//! `FakeHost` serves pre-populated local directories instead of cloning, and
//! records every operation so tests can assert what would have reached the
//! remote.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::host::{HostError, PullRequest, RepositoryHost, Workspace};

/// An operation performed through the fake host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Clone {
        url: String,
    },
    Checkout {
        url: String,
        branch: String,
    },
    Push {
        url: String,
        branch: String,
        message: String,
        force: bool,
    },
    PullRequest {
        url: String,
        base: String,
        title: String,
        body: String,
    },
}

impl Operation {
    /// Whether the operation changes state on the remote.
    pub fn is_remote_mutation(&self) -> bool {
        matches!(self, Operation::Push { .. } | Operation::PullRequest { .. })
    }
}

type Log = Arc<Mutex<Vec<Operation>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Repository host backed by local directories.
#[derive(Debug, Default)]
pub struct FakeHost {
    repositories: Mutex<HashMap<String, PathBuf>>,
    existing_prs: Mutex<HashMap<String, String>>,
    log: Log,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `dir` as the working copy of `url`.
    pub fn with_repository(self, url: &str, dir: impl Into<PathBuf>) -> Self {
        lock(&self.repositories).insert(url.to_string(), dir.into());
        self
    }

    /// Make pull request creation for `url` fail as a duplicate of `pr_url`.
    pub fn with_existing_pr(self, url: &str, pr_url: &str) -> Self {
        lock(&self.existing_prs).insert(url.to_string(), pr_url.to_string());
        self
    }

    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.log).clone()
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn clone_or_reuse(
        &self,
        url: &str,
        _clone_dir: &Path,
    ) -> Result<Box<dyn Workspace>, HostError> {
        let path = lock(&self.repositories)
            .get(url)
            .cloned()
            .ok_or_else(|| HostError::Clone {
                url: url.to_string(),
                reason: "repository not found".to_string(),
            })?;
        lock(&self.log).push(Operation::Clone {
            url: url.to_string(),
        });
        let snapshot = snapshot(&path)?;
        Ok(Box::new(FakeWorkspace {
            url: url.to_string(),
            path,
            branch: None,
            snapshot,
            existing_pr: lock(&self.existing_prs).get(url).cloned(),
            log: Arc::clone(&self.log),
        }))
    }
}

/// Working copy handed out by [`FakeHost`].
#[derive(Debug)]
pub struct FakeWorkspace {
    url: String,
    path: PathBuf,
    branch: Option<String>,
    snapshot: BTreeMap<PathBuf, String>,
    existing_pr: Option<String>,
    log: Log,
}

#[async_trait]
impl Workspace for FakeWorkspace {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn checkout_or_create_branch(&mut self, branch: &str) -> Result<(), HostError> {
        self.branch = Some(branch.to_string());
        lock(&self.log).push(Operation::Checkout {
            url: self.url.clone(),
            branch: branch.to_string(),
        });
        Ok(())
    }

    async fn commit_all_and_push(
        &mut self,
        message: &str,
        branch: &str,
        force: bool,
    ) -> Result<(), HostError> {
        self.branch = Some(branch.to_string());
        lock(&self.log).push(Operation::Push {
            url: self.url.clone(),
            branch: branch.to_string(),
            message: message.to_string(),
            force,
        });
        Ok(())
    }

    async fn open_pull_request(
        &self,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostError> {
        if let Some(url) = &self.existing_pr {
            return Err(HostError::PullRequestExists { url: url.clone() });
        }
        let mut log = lock(&self.log);
        log.push(Operation::PullRequest {
            url: self.url.clone(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        let number = log
            .iter()
            .filter(|op| matches!(op, Operation::PullRequest { .. }))
            .count() as u64;
        Ok(PullRequest {
            number,
            url: format!("{}/pull/{number}", self.url.trim_end_matches(".git")),
        })
    }

    /// Lists files whose content changed since the workspace was handed out.
    async fn diff(&self) -> Result<String, HostError> {
        let current = snapshot(&self.path)?;
        let mut out = String::new();
        for (file, content) in &current {
            match self.snapshot.get(file) {
                None => out.push_str(&format!("added: {}\n", file.display())),
                Some(before) if before != content => {
                    out.push_str(&format!("modified: {}\n", file.display()))
                }
                Some(_) => {}
            }
        }
        for file in self.snapshot.keys() {
            if !current.contains_key(file) {
                out.push_str(&format!("deleted: {}\n", file.display()));
            }
        }
        Ok(out)
    }
}

/// Contents of every file under `root`, keyed by relative path.
fn snapshot(root: &Path) -> Result<BTreeMap<PathBuf, String>, HostError> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let content = String::from_utf8_lossy(&std::fs::read(&path)?).into_owned();
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                files.insert(relative, content);
            }
        }
    }
    Ok(files)
}
