//! GitHub repository URLs.

use std::fmt;
use std::sync::LazyLock;

use imgsync_core::HostError;
use regex::Regex;

use crate::host::GitCredentials;

/// `https://[user[:token]@]github.com/owner/repo[.git]`
static HTTPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?:[^@/]+@)?github\.com/([^/]+)/([^/]+?)(?:\.git)?/?$")
        .expect("valid regex")
});
/// `git@github.com:owner/repo.git` or `ssh://git@github.com/owner/repo.git`
static SSH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ssh://)?git@github\.com[:/]([^/]+)/([^/]+?)(?:\.git)?$").expect("valid regex")
});

/// `owner/repo` identifier of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// GitHub treats owner and repository names case-insensitively.
    pub fn same_repository(&self, other: &RepoSlug) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn capture(re: &Regex, url: &str) -> Option<RepoSlug> {
    let caps = re.captures(url)?;
    Some(RepoSlug {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}

/// Extract `owner/repo` from an HTTPS or SSH GitHub URL.
pub fn parse_repo_url(url: &str) -> Result<RepoSlug, HostError> {
    let url = url.trim();
    capture(&HTTPS, url)
        .or_else(|| capture(&SSH, url))
        .ok_or_else(|| HostError::InvalidUrl {
            url: url.to_string(),
        })
}

/// HTTPS remote URL carrying the token, used for fetch and push.
pub fn authenticated_url(slug: &RepoSlug, credentials: &GitCredentials) -> String {
    format!(
        "https://{}:{}@github.com/{}/{}.git",
        credentials.username, credentials.token, slug.owner, slug.name
    )
}
