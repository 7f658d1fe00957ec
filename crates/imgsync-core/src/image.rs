//! Container image references (`registry/path/name:tag`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRefError {
    #[error("invalid image reference '{reference}': missing tag (expected name:tag)")]
    MissingTag { reference: String },

    #[error("invalid image reference '{reference}': {reason}")]
    Invalid { reference: String, reason: String },
}

/// A tagged image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    reference: String,
    name: String,
    tag: String,
}

impl ImageRef {
    pub fn parse(reference: &str) -> Result<Self, ImageRefError> {
        let invalid = |reason: &str| ImageRefError::Invalid {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        if reference.is_empty() || reference.chars().any(char::is_whitespace) {
            return Err(invalid("must be non-empty and contain no whitespace"));
        }
        if reference.contains('@') {
            return Err(invalid("digest references are not supported"));
        }

        // A ':' before the last '/' belongs to a registry port.
        let last_component = reference.rfind('/').map_or(0, |i| i + 1);
        let Some(colon) = reference[last_component..].rfind(':') else {
            return Err(ImageRefError::MissingTag {
                reference: reference.to_string(),
            });
        };
        let split = last_component + colon;
        let (name, tag) = (&reference[..split], &reference[split + 1..]);

        if tag.is_empty() {
            return Err(invalid("empty tag"));
        }
        if name.is_empty() || name.ends_with('/') {
            return Err(invalid("empty image name"));
        }

        Ok(Self {
            reference: reference.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Full reference, exactly as given.
    pub fn as_str(&self) -> &str {
        &self.reference
    }

    /// Repository part, including registry and namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Last path component of the name (`ghcr.io/org/app` -> `app`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Branch the integration is pushed to.
    pub fn branch_name(&self) -> String {
        format!("integrate-{}-{}", self.short_name(), self.tag)
    }

    /// Pull request title, also used as the commit message.
    pub fn pr_title(&self) -> String {
        format!("chore: integrate image {}:{}", self.short_name(), self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = ImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}
