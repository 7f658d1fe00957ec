//! [`RepositoryHost`] backed by the `git` CLI and the GitHub REST API.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use imgsync_core::{HostError, PullRequest, RepositoryHost, Workspace};
use tracing::info;

use crate::git::Git;
use crate::github::GitHubClient;
use crate::url::{authenticated_url, parse_repo_url, RepoSlug};

/// Credentials used for pushing and for the API.
#[derive(Clone)]
pub struct GitCredentials {
    pub username: String,
    pub token: String,
    pub email: Option<String>,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"***")
            .field("email", &self.email)
            .finish()
    }
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Commit email; defaults to the GitHub no-reply address of `username`.
    pub fn email(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| format!("{}@users.noreply.github.com", self.username))
    }
}

/// Clones GitHub repositories and opens pull requests on them.
pub struct GitHubHost {
    credentials: GitCredentials,
    client: Arc<GitHubClient>,
}

impl GitHubHost {
    pub fn new(credentials: GitCredentials, client: GitHubClient) -> Self {
        Self {
            credentials,
            client: Arc::new(client),
        }
    }

    /// Open an existing clone at `local`, checking it tracks `slug`.
    async fn reuse(&self, local: &Path, slug: &RepoSlug) -> Result<Git, HostError> {
        info!(path = %local.display(), "using existing clone");
        let git = Git::new(local).with_secret(self.credentials.token.as_str());
        let existing = git.remote_url("origin").await?;
        match parse_repo_url(&existing) {
            Ok(actual) if actual.same_repository(slug) => Ok(git),
            Ok(actual) => Err(HostError::RemoteMismatch {
                path: local.to_path_buf(),
                expected: slug.to_string(),
                actual: actual.to_string(),
            }),
            Err(_) => Err(HostError::RemoteMismatch {
                path: local.to_path_buf(),
                expected: slug.to_string(),
                actual: existing,
            }),
        }
    }
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn clone_or_reuse(
        &self,
        url: &str,
        clone_dir: &Path,
    ) -> Result<Box<dyn Workspace>, HostError> {
        let slug = parse_repo_url(url)?;
        let local = clone_path(clone_dir, &slug);
        let remote = authenticated_url(&slug, &self.credentials);

        let git = if local.exists() {
            self.reuse(&local, &slug).await?
        } else {
            info!(url, path = %local.display(), "cloning repository");
            tokio::fs::create_dir_all(clone_dir).await?;
            Git::clone(&remote, &local, Some(&self.credentials.token))
                .await
                .map_err(|err| match err {
                    HostError::Clone { reason, .. } => HostError::Clone {
                        url: url.to_string(),
                        reason,
                    },
                    other => other,
                })?
        };

        git.configure_identity(&self.credentials.username, &self.credentials.email())
            .await?;
        git.set_remote_url("origin", &remote).await?;

        Ok(Box::new(GitHubWorkspace {
            slug,
            git,
            client: Arc::clone(&self.client),
        }))
    }
}

/// A local clone of a GitHub repository.
pub struct GitHubWorkspace {
    slug: RepoSlug,
    git: Git,
    client: Arc<GitHubClient>,
}

impl GitHubWorkspace {
    pub fn slug(&self) -> &RepoSlug {
        &self.slug
    }
}

#[async_trait]
impl Workspace for GitHubWorkspace {
    fn path(&self) -> &Path {
        self.git.dir()
    }

    async fn checkout_or_create_branch(&mut self, branch: &str) -> Result<(), HostError> {
        self.git.checkout_or_create(branch).await
    }

    async fn commit_all_and_push(
        &mut self,
        message: &str,
        branch: &str,
        force: bool,
    ) -> Result<(), HostError> {
        self.git.checkout_or_create(branch).await?;
        self.git.commit_all(message).await?;
        self.git.push(branch, force).await?;
        info!(repository = %self.slug, branch, "pushed");
        Ok(())
    }

    async fn open_pull_request(
        &self,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostError> {
        let head = self.git.current_branch().await?;
        if let Some(existing) = self
            .client
            .find_open_pull_request(&self.slug, &head, base)
            .await?
        {
            return Err(HostError::PullRequestExists { url: existing.url });
        }
        let pr = self
            .client
            .create_pull_request(&self.slug, &head, base, title, body)
            .await?;
        info!(repository = %self.slug, url = %pr.url, "pull request created");
        Ok(pr)
    }

    async fn diff(&self) -> Result<String, HostError> {
        self.git.diff().await
    }
}

/// Local directory a repository is cloned into under `clone_dir`.
pub fn clone_path(clone_dir: &Path, slug: &RepoSlug) -> PathBuf {
    clone_dir.join(&slug.name)
}
