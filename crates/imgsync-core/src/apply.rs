//! Apply one integration entry to a local checkout.
//!
//! Per-file problems (absent files, unresolvable paths, unparsable documents)
//! are collected into an [`IntegrationResult`] so that one bad location does
//! not hide the others.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::document::{Document, DocumentError, Node};
use crate::manifest::{load_manifest, IntegrationEntry, IntegrationManifest, ManifestError};
use crate::path::{set, PathError, PathExpr};

/// Outcome of applying one integration entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrationResult {
    /// Files written, relative to the repository root, as declared.
    pub updated_files: Vec<PathBuf>,
    /// Declared files that do not exist in the checkout.
    pub missing_files: Vec<PathBuf>,
    /// One message per failed edit, naming the file and path expression.
    pub path_errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("integration index {index} out of range ({count} integrations defined)")]
    InvalidIntegrationIndex { index: usize, count: usize },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Error)]
enum EditError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Load `target`, write each `(path, value)` pair and save the file once.
fn edit_file<'a>(
    target: &Path,
    edits: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<(), EditError> {
    let mut document = Document::load(target)?;
    for (path, value) in edits {
        let expr: PathExpr = path.parse()?;
        set(document.root_mut(), &expr, Node::from(value))?;
        debug!(file = %target.display(), path, "value replaced");
    }
    document.save()?;
    Ok(())
}

/// Apply `entry` to the checkout at `base_dir`, writing `image` to every
/// `replace-image` location and the declared `service-spec` values.
pub fn apply_entry(entry: &IntegrationEntry, base_dir: &Path, image: &str) -> IntegrationResult {
    let mut result = IntegrationResult::default();

    for replace in &entry.replace_image {
        let target = base_dir.join(&replace.file);
        if !target.is_file() {
            warn!(file = %replace.file, "replace-image file not found");
            result.missing_files.push(PathBuf::from(&replace.file));
            continue;
        }
        match edit_file(&target, [(replace.path.as_str(), image)]) {
            Ok(()) => {
                info!(file = %replace.file, path = %replace.path, image, "image replaced");
                result.updated_files.push(PathBuf::from(&replace.file));
            }
            Err(err) => {
                warn!(file = %replace.file, path = %replace.path, error = %err, "image replacement failed");
                result
                    .path_errors
                    .push(format!("{}: {} -> {}", replace.file, replace.path, err));
            }
        }
    }

    for spec in &entry.service_spec {
        let target = base_dir.join(&spec.file);
        if !target.is_file() {
            warn!(file = %spec.file, "service-spec file not found");
            result.missing_files.push(PathBuf::from(&spec.file));
            continue;
        }
        let edits = spec
            .edits()
            .map(|pv| (pv.path.as_str(), pv.value.as_str()));
        match edit_file(&target, edits) {
            Ok(()) => {
                info!(file = %spec.file, "service-spec applied");
                result.updated_files.push(PathBuf::from(&spec.file));
            }
            Err(err) => {
                warn!(file = %spec.file, error = %err, "service-spec update failed");
                result
                    .path_errors
                    .push(format!("{}: service-spec -> {}", spec.file, err));
            }
        }
    }

    result
}

/// Apply the entry at `index` of `manifest`.
pub fn apply_integration(
    manifest: &IntegrationManifest,
    index: usize,
    base_dir: &Path,
    image: &str,
) -> Result<IntegrationResult, ApplyError> {
    let entry = manifest
        .integrations
        .get(index)
        .ok_or(ApplyError::InvalidIntegrationIndex {
            index,
            count: manifest.len(),
        })?;
    Ok(apply_entry(entry, base_dir, image))
}

/// Load the manifest at `metadata_path` and apply the entry at `index`.
pub fn apply_integration_from_file(
    metadata_path: &Path,
    index: usize,
    base_dir: &Path,
    image: &str,
) -> Result<IntegrationResult, ApplyError> {
    let manifest = load_manifest(metadata_path)?;
    apply_integration(&manifest, index, base_dir, image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{PathValue, ReplaceImageEntry, ServiceSpecEntry};
    use tempfile::TempDir;

    fn entry(replace: &[(&str, &str)], specs: Vec<ServiceSpecEntry>) -> IntegrationEntry {
        IntegrationEntry {
            consumer_repository: "https://github.com/org/consumer".to_string(),
            replace_image: replace
                .iter()
                .map(|(file, path)| ReplaceImageEntry {
                    file: file.to_string(),
                    path: path.to_string(),
                })
                .collect(),
            service_spec: specs,
        }
    }

    #[test]
    fn invalid_index_is_an_error() {
        let manifest = IntegrationManifest {
            integrations: vec![entry(&[("a.yaml", "image")], vec![])],
        };
        let dir = TempDir::new().unwrap();
        let err = apply_integration(&manifest, 3, dir.path(), "x:1").unwrap_err();
        assert!(matches!(
            err,
            ApplyError::InvalidIntegrationIndex { index: 3, count: 1 }
        ));
    }

    #[test]
    fn malformed_path_is_recorded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "image: old\n").unwrap();
        let result = apply_entry(&entry(&[("a.yaml", "image[")], vec![]), dir.path(), "x:1");
        assert!(result.updated_files.is_empty());
        assert_eq!(result.path_errors.len(), 1);
        assert!(result.path_errors[0].starts_with("a.yaml: image[ -> malformed path"));
    }

    #[test]
    fn unsupported_extension_is_recorded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.toml"), "image = 'old'\n").unwrap();
        let result = apply_entry(&entry(&[("a.toml", "image")], vec![]), dir.path(), "x:1");
        assert!(result.path_errors[0].contains("unsupported file format"));
    }

    #[test]
    fn failing_service_spec_is_recorded_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "image: old\n").unwrap();
        std::fs::write(dir.path().join("svc.json"), r#"{"user": "root"}"#).unwrap();
        let spec = ServiceSpecEntry {
            file: "svc.json".to_string(),
            user: Some(PathValue {
                path: "user".to_string(),
                value: "_daemon_".to_string(),
            }),
            command: Some(PathValue {
                path: "entrypoint.cmd".to_string(),
                value: "run".to_string(),
            }),
        };
        let result = apply_entry(&entry(&[("a.yaml", "image")], vec![spec]), dir.path(), "x:1");
        assert_eq!(result.updated_files, vec![PathBuf::from("a.yaml")]);
        assert_eq!(
            result.path_errors,
            vec!["svc.json: service-spec -> missing key 'entrypoint' in path 'entrypoint.cmd'"]
        );
        // Nothing is written when any edit of the file fails.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("svc.json")).unwrap(),
            r#"{"user": "root"}"#
        );
    }

    #[test]
    fn service_spec_fills_commented_empty_user() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "image: old\n").unwrap();
        std::fs::write(
            dir.path().join("svc.yaml"),
            "user: # set by ci\ncommand: serve\n",
        )
        .unwrap();
        let spec = ServiceSpecEntry {
            file: "svc.yaml".to_string(),
            user: Some(PathValue {
                path: "user".to_string(),
                value: "584792".to_string(),
            }),
            command: None,
        };
        let result = apply_entry(&entry(&[("a.yaml", "image")], vec![spec]), dir.path(), "x:1");
        assert!(result.path_errors.is_empty(), "{:?}", result.path_errors);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("svc.yaml")).unwrap(),
            "user: \"584792\" # set by ci\ncommand: serve\n"
        );
    }
}
