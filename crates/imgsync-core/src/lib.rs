//! imgsync core library
//!
//! Propagates a container image bump into downstream repositories: a
//! manifest names, per consumer repository, the YAML/JSON locations that hold
//! the image reference; the orchestrator patches them in a working copy and
//! hands off to a [`host::RepositoryHost`] to push and open pull requests.

pub mod apply;
pub mod document;
pub mod error;
pub mod fakes;
pub mod host;
pub mod image;
pub mod manifest;
pub mod orchestrator;
pub mod path;
pub mod pr_body;
pub mod telemetry;

pub use apply::{
    apply_entry, apply_integration, apply_integration_from_file, ApplyError, IntegrationResult,
};
pub use document::{Document, DocumentError, Format, Node, NodeKind, Scalar};
pub use error::{Result, SyncError};
pub use host::{HostError, PullRequest, RepositoryHost, Workspace};
pub use image::{ImageRef, ImageRefError};
pub use manifest::{
    load_manifest, IntegrationEntry, IntegrationManifest, ManifestError, PathValue,
    ReplaceImageEntry, ServiceSpecEntry, Violation,
};
pub use orchestrator::{
    validate_integration_result, IntegrationError, IntegrationOutcome, IntegrationRequest,
    Integrator,
};
pub use path::{PathError, PathExpr, Segment};
pub use pr_body::{render_pr_body, PrBodyContext};
pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
