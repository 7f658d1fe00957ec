//! Structured documents (YAML or JSON) loaded into a [`Node`] tree.
//!
//! YAML documents keep their source text: saving only rewrites the byte
//! ranges of values changed through [`Node::overwrite`]. JSON documents are
//! pretty-printed with 4-space indentation.

mod json;
pub mod node;
mod yaml;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use node::{Node, NodeKind, Scalar, ScalarStyle, Span};

/// Errors produced while loading or saving a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported file format: {} (expected .yaml, .yml or .json)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {message}", .path.display())]
    Yaml { path: PathBuf, message: String },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("duplicate key '{key}' in {}", .path.display())]
    DuplicateKey { path: PathBuf, key: String },

    #[error("cannot locate an edited value in the source text of {}", .path.display())]
    Unlocatable { path: PathBuf },
}

/// Serialization format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            _ => Err(DocumentError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// A document bound to a file path.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    format: Format,
    root: Node,
    source: String,
}

impl Document {
    /// Read and parse the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, format, text)
    }

    /// Parse `text` as if it had been read from `path`.
    pub fn parse(path: impl Into<PathBuf>, format: Format, text: String) -> Result<Self, DocumentError> {
        let path = path.into();
        let root = match format {
            Format::Json => json::parse(&text).map_err(|source| DocumentError::Json {
                path: path.clone(),
                source,
            })?,
            Format::Yaml => yaml::parse(&text).map_err(|e| yaml_error(&path, e))?,
        };
        Ok(Self {
            path,
            format,
            root,
            source: text,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Render the document text that [`Document::save`] would write.
    pub fn render(&self) -> Result<String, DocumentError> {
        match self.format {
            Format::Json => json::render(&self.root).map_err(|source| DocumentError::Json {
                path: self.path.clone(),
                source,
            }),
            Format::Yaml => {
                yaml::render(&self.source, &self.root).map_err(|e| yaml_error(&self.path, e))
            }
        }
    }

    /// Write the document back to its path.
    pub fn save(&self) -> Result<(), DocumentError> {
        let text = self.render()?;
        std::fs::write(&self.path, text).map_err(|source| DocumentError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn yaml_error(path: &Path, err: yaml::YamlError) -> DocumentError {
    let path = path.to_path_buf();
    match err {
        yaml::YamlError::Syntax(message) => DocumentError::Yaml { path, message },
        yaml::YamlError::ComplexKey => DocumentError::Yaml {
            path,
            message: "mapping keys must be scalars".to_string(),
        },
        yaml::YamlError::DuplicateKey(key) => DocumentError::DuplicateKey { path, key },
        yaml::YamlError::Unlocatable => DocumentError::Unlocatable { path },
    }
}
