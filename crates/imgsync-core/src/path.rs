//! Dotted path expressions over a document tree.
//!
//! A path is a `.`-separated list of segments. Each segment is either a
//! mapping key (`spec`) or a key followed by a single list index
//! (`containers[0]`). Resolution never creates anything: every step must
//! already exist in the document.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::document::{Node, NodeKind};

/// Errors raised while parsing or resolving a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed path '{path}': {reason}")]
    Malformed { path: String, reason: String },

    #[error("missing key '{key}' in path '{path}'")]
    MissingKey { key: String, path: String },

    #[error("expected a list at key '{key}' in path '{path}', found {found}")]
    NotAList {
        key: String,
        path: String,
        found: String,
    },

    #[error("index [{index}] out of bounds for '{key}' (length {len}) in path '{path}'")]
    IndexOutOfBounds {
        index: usize,
        key: String,
        len: usize,
        path: String,
    },
}

/// One step of a [`PathExpr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Mapping key.
    Key(String),
    /// Element `index` of the list stored under mapping key `key`.
    Index { key: String, index: usize },
}

/// A parsed path expression such as `spec.containers[0].image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    raw: String,
    segments: Vec<Segment>,
}

impl PathExpr {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let malformed = |reason: &str| PathError::Malformed {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(malformed("path is empty"));
        }

        let segments = split_segments(raw)
            .into_iter()
            .map(|part| parse_segment(part).map_err(|reason| malformed(&reason)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for PathExpr {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on `.` outside of brackets.
fn split_segments(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    if part.is_empty() {
        return Err("empty segment".to_string());
    }
    let Some(open) = part.find('[') else {
        if part.contains(']') {
            return Err(format!("']' without matching '[' in segment '{part}'"));
        }
        return Ok(Segment::Key(part.to_string()));
    };

    let key = &part[..open];
    if key.is_empty() {
        return Err(format!("missing key before '[' in segment '{part}'"));
    }
    if key.contains(']') {
        return Err(format!("']' without matching '[' in segment '{part}'"));
    }

    let rest = &part[open + 1..];
    let Some(close) = rest.find(']') else {
        return Err(format!("unclosed '[' in segment '{part}'"));
    };
    let inner = &rest[..close];
    let after = &rest[close + 1..];
    if inner.contains('[') || after.starts_with('[') {
        return Err(format!("nested indices are not supported in segment '{part}'"));
    }
    if !after.is_empty() {
        return Err(format!("unexpected text after ']' in segment '{part}'"));
    }

    if inner.starts_with('-') {
        return Err(format!("negative index '{inner}' in segment '{part}'"));
    }
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("index '{inner}' is not a non-negative integer"));
    }
    let index = inner
        .parse::<usize>()
        .map_err(|_| format!("index '{inner}' is too large"))?;

    Ok(Segment::Index {
        key: key.to_string(),
        index,
    })
}

fn missing_key(key: &str, path: &PathExpr) -> PathError {
    PathError::MissingKey {
        key: key.to_string(),
        path: path.to_string(),
    }
}

fn not_a_list(key: &str, path: &PathExpr, found: &str) -> PathError {
    PathError::NotAList {
        key: key.to_string(),
        path: path.to_string(),
        found: found.to_string(),
    }
}

fn out_of_bounds(index: usize, key: &str, len: usize, path: &PathExpr) -> PathError {
    PathError::IndexOutOfBounds {
        index,
        key: key.to_string(),
        len,
        path: path.to_string(),
    }
}

fn step<'a>(node: &'a Node, segment: &Segment, path: &PathExpr) -> Result<&'a Node, PathError> {
    match segment {
        Segment::Key(key) => node.get(key).ok_or_else(|| missing_key(key, path)),
        Segment::Index { key, index } => {
            let child = node
                .get(key)
                .ok_or_else(|| not_a_list(key, path, "nothing"))?;
            let items = child
                .as_sequence()
                .ok_or_else(|| not_a_list(key, path, child.kind_name()))?;
            items
                .get(*index)
                .ok_or_else(|| out_of_bounds(*index, key, items.len(), path))
        }
    }
}

fn step_mut<'a>(
    node: &'a mut Node,
    segment: &Segment,
    path: &PathExpr,
) -> Result<&'a mut Node, PathError> {
    match segment {
        Segment::Key(key) => node.get_mut(key).ok_or_else(|| missing_key(key, path)),
        Segment::Index { key, index } => {
            let child = node
                .get_mut(key)
                .ok_or_else(|| not_a_list(key, path, "nothing"))?;
            let found = child.kind_name();
            match &mut child.kind {
                NodeKind::Sequence(items) => {
                    let len = items.len();
                    items
                        .get_mut(*index)
                        .ok_or_else(|| out_of_bounds(*index, key, len, path))
                }
                _ => Err(not_a_list(key, path, found)),
            }
        }
    }
}

/// Resolve `path` against `root`.
pub fn get<'a>(root: &'a Node, path: &PathExpr) -> Result<&'a Node, PathError> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| step(node, segment, path))
}

/// Overwrite the existing value at `path` with `value`.
///
/// Only the terminal slot is replaced; a missing key or index anywhere along
/// the path is an error and leaves the tree untouched.
pub fn set(root: &mut Node, path: &PathExpr, value: Node) -> Result<(), PathError> {
    let mut current = root;
    for segment in path.segments() {
        current = step_mut(current, segment, path)?;
    }
    current.overwrite(value);
    Ok(())
}
