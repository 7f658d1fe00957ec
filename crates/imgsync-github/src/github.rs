//! GitHub REST client: find and open pull requests.

use std::fmt;
use std::time::Duration;

use imgsync_core::{HostError, PullRequest};
use octocrab::params::State;
use octocrab::Octocrab;
use tracing::{debug, info};

use crate::url::RepoSlug;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Environment variable overriding the API endpoint (set by GitHub Actions,
/// and by GitHub Enterprise installations).
pub const API_URL_ENV: &str = "GITHUB_API_URL";

fn into_pull_request(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        url: pr.html_url.map(|url| url.to_string()).unwrap_or_default(),
    }
}

fn api_error(repo: &RepoSlug, err: octocrab::Error) -> HostError {
    let reason = match &err {
        octocrab::Error::GitHub { source, .. } => {
            format!("{}: {}", source.status_code, source.message)
        }
        other => other.to_string(),
    };
    HostError::Api {
        repository: repo.to_string(),
        reason,
    }
}

/// GitHub REST API client
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    api_base: String,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client for `api_base` authenticating with `token`.
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self, HostError> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let setup_error = |reason: String| HostError::Api {
            repository: String::new(),
            reason,
        };
        let client = Octocrab::builder()
            .set_connect_timeout(Some(Duration::from_secs(10)))
            .set_read_timeout(Some(Duration::from_secs(30)))
            .set_write_timeout(Some(Duration::from_secs(30)))
            .personal_token(token.into())
            .base_uri(api_base.as_str())
            .map_err(|e| setup_error(format!("invalid API URL '{api_base}': {e}")))?
            .build()
            .map_err(|e| setup_error(format!("failed to create GitHub client: {e}")))?;
        Ok(Self { client, api_base })
    }

    /// Create a client for the endpoint in `GITHUB_API_URL`, or the public API.
    pub fn from_env(token: impl Into<String>) -> Result<Self, HostError> {
        let api_base = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(api_base, token)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// First open pull request from `owner:head` into `base`, if any.
    pub async fn find_open_pull_request(
        &self,
        repo: &RepoSlug,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequest>, HostError> {
        let qualified_head = format!("{}:{}", repo.owner, head);
        debug!(repository = %repo, head = %qualified_head, base, "looking for open pull requests");
        let open = self
            .client
            .pulls(&repo.owner, &repo.name)
            .list()
            .state(State::Open)
            .head(qualified_head)
            .base(base)
            .send()
            .await
            .map_err(|e| api_error(repo, e))?;
        Ok(open.items.into_iter().next().map(into_pull_request))
    }

    /// Open a pull request from `owner:head` into `base`.
    pub async fn create_pull_request(
        &self,
        repo: &RepoSlug,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostError> {
        let qualified_head = format!("{}:{}", repo.owner, head);
        info!(repository = %repo, head, base, "creating pull request");
        let created = self
            .client
            .pulls(&repo.owner, &repo.name)
            .create(title, qualified_head, base)
            .body(body)
            .send()
            .await
            .map_err(|e| api_error(repo, e))?;
        Ok(into_pull_request(created))
    }
}
