//! Integration orchestrator: prepare every consumer repository, then publish.
//!
//! All entries are cloned, patched and validated first. Only when every
//! entry is ready are branches pushed and pull requests opened, so a single
//! broken entry never leaves half of the consumers updated.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::apply::{apply_entry, IntegrationResult};
use crate::error::{Result, SyncError};
use crate::host::{HostError, PullRequest, RepositoryHost, Workspace};
use crate::image::ImageRef;
use crate::manifest::{load_manifest, IntegrationEntry};
use crate::pr_body::{render_pr_body, PrBodyContext};

/// Why a single integration entry could not be completed.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("integration {index} failed for {repository}: missing expected files: {}", join_paths(.files))]
    MissingFiles {
        index: usize,
        repository: String,
        files: Vec<PathBuf>,
    },

    #[error("integration {index} failed for {repository}: invalid path expressions:\n{}", bullet_list(.errors))]
    PathErrors {
        index: usize,
        repository: String,
        errors: Vec<String>,
    },

    #[error("integration {index} failed for {repository}: no changes detected in updated files")]
    NoChanges { index: usize, repository: String },

    #[error("integration {index} failed for {repository}: {source}")]
    Host {
        index: usize,
        repository: String,
        source: HostError,
    },
}

fn join_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn bullet_list(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format!("    - {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check the outcome of one entry.
///
/// Missing `service-spec` files are tolerated; anything else missing, any
/// path error, or no updated file at all fails the entry.
pub fn validate_integration_result(
    result: &IntegrationResult,
    index: usize,
    repository: &str,
    entry: &IntegrationEntry,
) -> std::result::Result<(), IntegrationError> {
    let allowed_missing: HashSet<&Path> = entry
        .service_spec
        .iter()
        .map(|spec| Path::new(spec.file.as_str()))
        .collect();

    let missing: Vec<PathBuf> = result
        .missing_files
        .iter()
        .filter(|p| !allowed_missing.contains(p.as_path()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(IntegrationError::MissingFiles {
            index,
            repository: repository.to_string(),
            files: missing,
        });
    }

    if !result.path_errors.is_empty() {
        return Err(IntegrationError::PathErrors {
            index,
            repository: repository.to_string(),
            errors: result.path_errors.clone(),
        });
    }

    if result.updated_files.is_empty() {
        return Err(IntegrationError::NoChanges {
            index,
            repository: repository.to_string(),
        });
    }

    Ok(())
}

/// Parameters of one `integrate-image` run.
#[derive(Debug, Clone)]
pub struct IntegrationRequest {
    pub metadata_path: PathBuf,
    /// Branch the pull requests target.
    pub base_branch: String,
    pub image: String,
    /// Directory consumer repositories are cloned into.
    pub clone_dir: PathBuf,
    /// Log diffs instead of committing, pushing and opening pull requests.
    pub dry_run: bool,
    pub triggering_pr: Option<String>,
}

/// What happened to one consumer repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationOutcome {
    pub index: usize,
    pub repository: String,
    pub result: IntegrationResult,
    /// Set when a pull request was opened.
    pub pull_request: Option<PullRequest>,
    /// Working-tree diff, set on dry runs.
    pub diff: Option<String>,
}

struct Prepared {
    index: usize,
    repository: String,
    workspace: Box<dyn Workspace>,
    result: IntegrationResult,
    body: String,
}

/// Drives image integrations through a [`RepositoryHost`].
pub struct Integrator {
    host: Arc<dyn RepositoryHost>,
}

impl Integrator {
    pub fn new(host: Arc<dyn RepositoryHost>) -> Self {
        Self { host }
    }

    /// Integrate `request.image` into every consumer listed in the manifest.
    pub async fn run(&self, request: &IntegrationRequest) -> Result<Vec<IntegrationOutcome>> {
        let manifest = load_manifest(&request.metadata_path)?;
        let image = ImageRef::parse(&request.image)?;

        let mut prepared = Vec::with_capacity(manifest.len());
        let mut failures = Vec::new();
        for (index, entry) in manifest.integrations.iter().enumerate() {
            info!(
                index,
                repository = %entry.consumer_repository,
                base_branch = %request.base_branch,
                "preparing integration"
            );
            match self.prepare(index, entry, &image, request).await {
                Ok(ready) => prepared.push(ready),
                Err(err) => {
                    error!(index, error = %err, "integration failed");
                    failures.push(err);
                }
            }
        }

        if !failures.is_empty() {
            return Err(SyncError::IntegrationsFailed {
                total: manifest.len(),
                failures,
            });
        }

        let branch = image.branch_name();
        let title = image.pr_title();
        let mut outcomes = Vec::with_capacity(prepared.len());
        for ready in prepared {
            let outcome = if request.dry_run {
                self.report_dry_run(ready).await?
            } else {
                self.publish(ready, &request.base_branch, &branch, &title).await?
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn prepare(
        &self,
        index: usize,
        entry: &IntegrationEntry,
        image: &ImageRef,
        request: &IntegrationRequest,
    ) -> std::result::Result<Prepared, IntegrationError> {
        let repository = entry.consumer_repository.clone();
        let host_error = |source: HostError| IntegrationError::Host {
            index,
            repository: repository.clone(),
            source,
        };

        let mut workspace = self
            .host
            .clone_or_reuse(&repository, &request.clone_dir)
            .await
            .map_err(host_error)?;
        workspace
            .checkout_or_create_branch(&request.base_branch)
            .await
            .map_err(host_error)?;

        let result = apply_entry(entry, workspace.path(), image.as_str());
        validate_integration_result(&result, index, &repository, entry)?;

        let body = render_pr_body(&PrBodyContext {
            image,
            entry,
            missing_files: &result.missing_files,
            triggering_pr: request.triggering_pr.as_deref(),
        });
        info!(index, %repository, updated = result.updated_files.len(), "integration prepared");

        Ok(Prepared {
            index,
            repository,
            workspace,
            result,
            body,
        })
    }

    async fn report_dry_run(&self, ready: Prepared) -> Result<IntegrationOutcome> {
        let diff = ready
            .workspace
            .diff()
            .await
            .map_err(|source| IntegrationError::Host {
                index: ready.index,
                repository: ready.repository.clone(),
                source,
            })?;
        info!(
            index = ready.index,
            repository = %ready.repository,
            "dry run: not committing, pushing or opening a pull request\n{diff}"
        );
        Ok(IntegrationOutcome {
            index: ready.index,
            repository: ready.repository,
            result: ready.result,
            pull_request: None,
            diff: Some(diff),
        })
    }

    async fn publish(
        &self,
        mut ready: Prepared,
        base_branch: &str,
        branch: &str,
        title: &str,
    ) -> Result<IntegrationOutcome> {
        let index = ready.index;
        let repository = ready.repository.clone();
        let host_error = |source: HostError| IntegrationError::Host {
            index,
            repository: repository.clone(),
            source,
        };

        ready
            .workspace
            .commit_all_and_push(title, branch, false)
            .await
            .map_err(host_error)?;
        let pull_request = ready
            .workspace
            .open_pull_request(base_branch, title, &ready.body)
            .await
            .map_err(host_error)?;
        info!(index, %repository, url = %pull_request.url, "pull request opened");

        Ok(IntegrationOutcome {
            index,
            repository: ready.repository,
            result: ready.result,
            pull_request: Some(pull_request),
            diff: None,
        })
    }
}
