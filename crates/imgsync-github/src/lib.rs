//! imgsync-github: the git + GitHub implementation of
//! [`imgsync_core::RepositoryHost`].
//!
//! Repositories are cloned with the `git` CLI over token-authenticated HTTPS;
//! pull requests are opened through the GitHub REST API.

pub mod git;
pub mod github;
pub mod host;
pub mod url;

pub use git::Git;
pub use github::{GitHubClient, API_URL_ENV, DEFAULT_API_URL};
pub use host::{clone_path, GitCredentials, GitHubHost, GitHubWorkspace};
pub use url::{authenticated_url, parse_repo_url, RepoSlug};
