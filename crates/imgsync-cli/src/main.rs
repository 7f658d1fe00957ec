//! imgsync CLI
//!
//! Propagates a freshly published container image into the repositories that
//! consume it.
//!
//! ## Commands
//!
//! - `integrate-image`: patch every consumer listed in a manifest and open PRs
//! - `validate`: check a manifest and summarise its integrations
//! - `apply`: patch a local checkout for one manifest entry, no git involved

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use imgsync_core::{
    apply_integration, load_manifest, IntegrationOutcome, IntegrationRequest, Integrator,
};
use imgsync_github::{GitCredentials, GitHubClient, GitHubHost};
use tracing::{error, info, Level};

const MISSING_TOKEN: &str = "GitHub token not provided and GH_TOKEN not set.";

#[derive(Parser, Debug)]
#[command(name = "imgsync")]
#[command(version = imgsync_core::VERSION)]
#[command(about = "Integrate container image bumps into consumer repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Patch every consumer repository in the manifest and open pull requests
    IntegrateImage {
        /// Integration manifest (YAML or JSON)
        metadata: PathBuf,

        /// Branch the pull requests target
        base_branch: String,

        /// Full image reference, e.g. ghcr.io/org/app:1.2.3
        image: String,

        /// GitHub token used to push and open pull requests
        #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        /// Username for authenticated git operations
        #[arg(long, default_value = "__token__")]
        github_username: String,

        /// Commit author email (default: the username's no-reply address)
        #[arg(long)]
        github_email: Option<String>,

        /// Directory to clone consumer repositories into (default: a
        /// temporary directory removed on exit)
        #[arg(long)]
        clone_dir: Option<PathBuf>,

        /// Patch and validate, then log diffs instead of pushing
        #[arg(long)]
        dry_run: bool,

        /// URL of the pull request that produced the image
        #[arg(long)]
        triggering_pr: Option<String>,
    },

    /// Validate a manifest and list its integrations
    Validate {
        /// Integration manifest (YAML or JSON)
        metadata: PathBuf,
    },

    /// Patch a local checkout for one integration entry
    Apply {
        /// Integration manifest (YAML or JSON)
        metadata: PathBuf,

        /// Full image reference
        image: String,

        /// Checkout the manifest's file paths are relative to
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,

        /// Integration entry to apply
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    imgsync_core::init_tracing(cli.json, level);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::IntegrateImage {
            metadata,
            base_branch,
            image,
            github_token,
            github_username,
            github_email,
            clone_dir,
            dry_run,
            triggering_pr,
        } => {
            let Some(token) = github_token.filter(|t| !t.is_empty()) else {
                bail!(MISSING_TOKEN);
            };
            let mut credentials = GitCredentials::new(github_username, token);
            if let Some(email) = github_email {
                credentials = credentials.with_email(email);
            }
            cmd_integrate_image(
                credentials,
                metadata,
                base_branch,
                image,
                clone_dir,
                dry_run,
                triggering_pr,
            )
            .await
        }
        Commands::Validate { metadata } => cmd_validate(&metadata),
        Commands::Apply {
            metadata,
            image,
            base_dir,
            index,
        } => cmd_apply(&metadata, &image, &base_dir, index),
    }
}

async fn cmd_integrate_image(
    credentials: GitCredentials,
    metadata: PathBuf,
    base_branch: String,
    image: String,
    clone_dir: Option<PathBuf>,
    dry_run: bool,
    triggering_pr: Option<String>,
) -> Result<()> {
    // Scratch clones live until the end of the run.
    let mut scratch = None;
    let clone_dir = match clone_dir {
        Some(dir) => dir,
        None => scratch
            .insert(tempfile::tempdir().context("Failed to create clone directory")?)
            .path()
            .to_path_buf(),
    };

    let client = GitHubClient::from_env(credentials.token.clone())
        .context("Failed to create GitHub client")?;
    let host = GitHubHost::new(credentials, client);
    let integrator = Integrator::new(Arc::new(host));

    let request = IntegrationRequest {
        metadata_path: metadata,
        base_branch,
        image,
        clone_dir,
        dry_run,
        triggering_pr,
    };
    let outcomes = integrator.run(&request).await?;
    report(&outcomes, dry_run);
    Ok(())
}

fn report(outcomes: &[IntegrationOutcome], dry_run: bool) {
    for outcome in outcomes {
        match (&outcome.pull_request, dry_run) {
            (Some(pr), _) => println!("{}: {}", outcome.repository, pr.url),
            (None, true) => println!(
                "{}: dry run, {} file(s) would change",
                outcome.repository,
                outcome.result.updated_files.len()
            ),
            (None, false) => println!("{}: no pull request", outcome.repository),
        }
    }
}

fn cmd_validate(metadata: &Path) -> Result<()> {
    let manifest = load_manifest(metadata)
        .with_context(|| format!("Invalid manifest {}", metadata.display()))?;

    println!(
        "{}: {} integration(s)",
        metadata.display(),
        manifest.integrations.len()
    );
    for (index, entry) in manifest.integrations.iter().enumerate() {
        println!(
            "  [{index}] {} ({} image replacement(s), {} service spec(s))",
            entry.consumer_repository,
            entry.replace_image.len(),
            entry.service_spec.len()
        );
    }
    Ok(())
}

fn cmd_apply(metadata: &Path, image: &str, base_dir: &Path, index: usize) -> Result<()> {
    let manifest = load_manifest(metadata)
        .with_context(|| format!("Invalid manifest {}", metadata.display()))?;
    let result = apply_integration(&manifest, index, base_dir, image)?;
    info!(
        updated = result.updated_files.len(),
        missing = result.missing_files.len(),
        errors = result.path_errors.len(),
        "applied integration {index}"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.path_errors.is_empty() {
        bail!("{} path expression(s) failed", result.path_errors.len());
    }
    Ok(())
}
