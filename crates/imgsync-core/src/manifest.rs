//! Integration manifest: which consumer repositories to patch, and where.
//!
//! ```yaml
//! integrations:
//!   - consumer-repository: https://github.com/org/consumer
//!     replace-image:
//!       - file: charms/app/metadata.yaml
//!         path: resources.oci-image.upstream-source
//!     service-spec:
//!       - file: charms/app/src/service-spec.json
//!         user:
//!           path: user
//!           value: "584792"
//! ```
//!
//! Validation walks the loaded [`Node`] tree and reports every violation with
//! its location instead of stopping at the first one.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Document, DocumentError, Node};

/// Top-level manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IntegrationManifest {
    pub integrations: Vec<IntegrationEntry>,
}

/// One consumer repository and the edits to make in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IntegrationEntry {
    pub consumer_repository: String,
    pub replace_image: Vec<ReplaceImageEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_spec: Vec<ServiceSpecEntry>,
}

/// Location that receives the new image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReplaceImageEntry {
    pub file: String,
    pub path: String,
}

/// Auxiliary service settings written alongside the image bump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServiceSpecEntry {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PathValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathValue>,
}

impl ServiceSpecEntry {
    /// The `user` and `command` edits that are present, in that order.
    pub fn edits(&self) -> impl Iterator<Item = &PathValue> {
        self.user.iter().chain(self.command.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PathValue {
    pub path: String,
    pub value: String,
}

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location such as `integrations[0].service-spec[1].user.path`.
    pub location: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.location, self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("metadata file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to load metadata: {0}")]
    Document(#[from] DocumentError),

    #[error("invalid integration metadata:\n{}", list_violations(.violations))]
    Invalid { violations: Vec<Violation> },
}

fn list_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl IntegrationManifest {
    /// Validate a loaded document tree and build the manifest from it.
    pub fn from_node(node: &Node) -> Result<Self, ManifestError> {
        let mut checker = Checker::default();
        checker.manifest(node);
        if !checker.violations.is_empty() {
            return Err(ManifestError::Invalid {
                violations: checker.violations,
            });
        }
        serde_json::from_value(node.to_json()).map_err(|e| ManifestError::Invalid {
            violations: vec![Violation {
                location: String::new(),
                message: e.to_string(),
            }],
        })
    }

    /// Serialize back into a document tree.
    pub fn to_node(&self) -> Result<Node, serde_json::Error> {
        serde_json::to_value(self).map(Node::from)
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

/// Load and validate the manifest at `path` (YAML or JSON).
pub fn load_manifest(path: impl AsRef<Path>) -> Result<IntegrationManifest, ManifestError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let document = Document::load(path)?;
    IntegrationManifest::from_node(document.root())
}

fn child(location: &str, key: &str) -> String {
    if location.is_empty() {
        key.to_string()
    } else {
        format!("{location}.{key}")
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn fail(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            location: location.into(),
            message: message.into(),
        });
    }

    /// Check that `node` is a mapping with only `allowed` keys.
    fn mapping<'n>(
        &mut self,
        node: &'n Node,
        location: &str,
        allowed: &[&str],
    ) -> Option<&'n [(String, Node)]> {
        let Some(entries) = node.as_mapping() else {
            self.fail(location, format!("expected a mapping, found {}", node.kind_name()));
            return None;
        };
        for (key, _) in entries {
            if !allowed.contains(&key.as_str()) {
                self.fail(child(location, key), "unknown field");
            }
        }
        Some(entries)
    }

    fn required<'n>(
        &mut self,
        entries: &'n [(String, Node)],
        location: &str,
        key: &str,
    ) -> Option<&'n Node> {
        let found = lookup(entries, key);
        if found.is_none() {
            self.fail(child(location, key), "missing required field");
        }
        found
    }

    fn string(&mut self, node: &Node, location: &str, allow_empty: bool) {
        match node.as_str() {
            Some(s) if s.trim().is_empty() && !allow_empty => {
                self.fail(location, "must not be empty")
            }
            Some(_) => {}
            None => self.fail(location, format!("expected a string, found {}", node.kind_name())),
        }
    }

    fn list<'n>(&mut self, node: &'n Node, location: &str, non_empty: bool) -> &'n [Node] {
        match node.as_sequence() {
            Some(items) => {
                if non_empty && items.is_empty() {
                    self.fail(location, "must contain at least one entry");
                }
                items
            }
            None => {
                self.fail(location, format!("expected a list, found {}", node.kind_name()));
                &[]
            }
        }
    }

    fn required_string(&mut self, entries: &[(String, Node)], location: &str, key: &str) {
        if let Some(node) = self.required(entries, location, key) {
            self.string(node, &child(location, key), false);
        }
    }

    fn manifest(&mut self, node: &Node) {
        let Some(entries) = self.mapping(node, "", &["integrations"]) else {
            return;
        };
        let Some(integrations) = self.required(entries, "", "integrations") else {
            return;
        };
        for (i, entry) in self.list(integrations, "integrations", true).iter().enumerate() {
            self.entry(entry, &format!("integrations[{i}]"));
        }
    }

    fn entry(&mut self, node: &Node, location: &str) {
        let Some(entries) = self.mapping(
            node,
            location,
            &["consumer-repository", "replace-image", "service-spec"],
        ) else {
            return;
        };
        self.required_string(entries, location, "consumer-repository");

        if let Some(replace) = self.required(entries, location, "replace-image") {
            let list_location = child(location, "replace-image");
            for (i, item) in self.list(replace, &list_location, true).iter().enumerate() {
                let item_location = format!("{list_location}[{i}]");
                if let Some(fields) = self.mapping(item, &item_location, &["file", "path"]) {
                    self.required_string(fields, &item_location, "file");
                    self.required_string(fields, &item_location, "path");
                }
            }
        }

        if let Some(specs) = lookup(entries, "service-spec") {
            let list_location = child(location, "service-spec");
            for (i, item) in self.list(specs, &list_location, false).iter().enumerate() {
                self.service_spec(item, &format!("{list_location}[{i}]"));
            }
        }
    }

    fn service_spec(&mut self, node: &Node, location: &str) {
        let Some(fields) = self.mapping(node, location, &["file", "user", "command"]) else {
            return;
        };
        self.required_string(fields, location, "file");

        let mut present = 0;
        for key in ["user", "command"] {
            let Some(value) = lookup(fields, key) else {
                continue;
            };
            present += 1;
            let value_location = child(location, key);
            if let Some(pv) = self.mapping(value, &value_location, &["path", "value"]) {
                self.required_string(pv, &value_location, "path");
                if let Some(v) = self.required(pv, &value_location, "value") {
                    self.string(v, &child(&value_location, "value"), true);
                }
            }
        }
        if present == 0 {
            self.fail(location, "at least one of 'user' or 'command' must be provided");
        }
    }
}

fn lookup<'n>(entries: &'n [(String, Node)], key: &str) -> Option<&'n Node> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}
