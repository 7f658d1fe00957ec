//! Thin async driver around the `git` command line.

use std::path::{Path, PathBuf};
use std::process::Output;

use imgsync_core::HostError;
use tokio::process::Command;
use tracing::debug;

/// A git working tree.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
    secret: Option<String>,
}

fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
        _ => text.to_string(),
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<Output, HostError> {
    debug!(dir = %dir.display(), command = args.first().copied().unwrap_or(""), "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await?;
    Ok(output)
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            secret: None,
        }
    }

    /// Mask `secret` in any error output.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Clone `url` into `dest`. The parent of `dest` must exist.
    pub async fn clone(url: &str, dest: &Path, secret: Option<&str>) -> Result<Self, HostError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let dest_arg = dest.to_string_lossy();
        let output = run_git(parent, &["clone", url, &dest_arg]).await?;
        if !output.status.success() {
            return Err(HostError::Clone {
                url: redact(url, secret),
                reason: redact(String::from_utf8_lossy(&output.stderr).trim(), secret),
            });
        }
        let git = Self::new(dest);
        Ok(match secret {
            Some(secret) => git.with_secret(secret),
            None => git,
        })
    }

    /// Run `git <args>` in the working tree and return stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, HostError> {
        let output = run_git(&self.dir, args).await?;
        if !output.status.success() {
            return Err(HostError::Git {
                command: args.first().copied().unwrap_or("").to_string(),
                path: self.dir.clone(),
                stderr: redact(
                    String::from_utf8_lossy(&output.stderr).trim(),
                    self.secret.as_deref(),
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn remote_url(&self, remote: &str) -> Result<String, HostError> {
        Ok(self
            .run(&["remote", "get-url", remote])
            .await?
            .trim()
            .to_string())
    }

    pub async fn set_remote_url(&self, remote: &str, url: &str) -> Result<(), HostError> {
        self.run(&["remote", "set-url", remote, url]).await?;
        Ok(())
    }

    /// Set the repository-local author identity.
    pub async fn configure_identity(&self, name: &str, email: &str) -> Result<(), HostError> {
        self.run(&["config", "user.name", name]).await?;
        self.run(&["config", "user.email", email]).await?;
        Ok(())
    }

    pub async fn current_branch(&self) -> Result<String, HostError> {
        Ok(self
            .run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .trim()
            .to_string())
    }

    /// Check out `branch`, creating it from HEAD when it does not exist.
    pub async fn checkout_or_create(&self, branch: &str) -> Result<(), HostError> {
        if self.run(&["checkout", branch]).await.is_ok() {
            return Ok(());
        }
        debug!(branch, "branch not found, creating it");
        self.run(&["checkout", "-b", branch]).await?;
        Ok(())
    }

    /// Stage all changes and commit them.
    pub async fn commit_all(&self, message: &str) -> Result<(), HostError> {
        self.run(&["add", "--all"]).await?;
        self.run(&["commit", "-m", message]).await?;
        Ok(())
    }

    /// Push `branch` to `origin`, setting upstream.
    pub async fn push(&self, branch: &str, force: bool) -> Result<(), HostError> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.extend(["-u", "origin", branch]);
        self.run(&args).await?;
        Ok(())
    }

    /// Diff of the working tree against the index.
    pub async fn diff(&self) -> Result<String, HostError> {
        self.run(&["diff"]).await
    }
}
