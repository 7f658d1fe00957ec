//! Crate-level error taxonomy.

use crate::apply::ApplyError;
use crate::image::ImageRefError;
use crate::manifest::ManifestError;
use crate::orchestrator::IntegrationError;

/// Errors that abort an integration run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Image(#[from] ImageRefError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Every failing entry of the run, collected before any push.
    #[error("{} of {total} integrations failed:\n{}", .failures.len(), list_failures(.failures))]
    IntegrationsFailed {
        total: usize,
        failures: Vec<IntegrationError>,
    },

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn list_failures(failures: &[IntegrationError]) -> String {
    failures
        .iter()
        .map(|f| format!("  - {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for imgsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
