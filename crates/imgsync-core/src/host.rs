//! Repository hosting seam: cloning, branching, pushing and pull requests.
//!
//! The orchestrator only talks to these traits. `imgsync-github` provides the
//! git + GitHub implementation and [`crate::fakes`] an in-memory one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a repository host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unsupported repository URL: {url}")]
    InvalidUrl { url: String },

    #[error("failed to clone {url}: {reason}")]
    Clone { url: String, reason: String },

    #[error("repository at {} points to a different remote ({actual} != {expected})", .path.display())]
    RemoteMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("git {command} failed in {}: {stderr}", .path.display())]
    Git {
        command: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("a pull request already exists: {url}")]
    PullRequestExists { url: String },

    #[error("{repository}: API request failed: {reason}")]
    Api { repository: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A pull request that was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// A hosting service able to produce local working copies.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Clone `url` under `clone_dir`, or reuse an existing clone of the same
    /// repository found there.
    async fn clone_or_reuse(
        &self,
        url: &str,
        clone_dir: &Path,
    ) -> Result<Box<dyn Workspace>, HostError>;
}

/// A local working copy of a hosted repository.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Root of the working tree.
    fn path(&self) -> &Path;

    /// Switch to `branch`, creating it from the current HEAD if needed.
    async fn checkout_or_create_branch(&mut self, branch: &str) -> Result<(), HostError>;

    /// Stage everything, commit on `branch` and push it to `origin`.
    async fn commit_all_and_push(
        &mut self,
        message: &str,
        branch: &str,
        force: bool,
    ) -> Result<(), HostError>;

    /// Open a pull request from the current branch into `base`.
    async fn open_pull_request(
        &self,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostError>;

    /// Textual diff of the working tree against HEAD.
    async fn diff(&self) -> Result<String, HostError>;
}
