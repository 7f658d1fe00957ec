//! Tagged document tree shared by the YAML and JSON loaders.

use serde_json::{Map, Number, Value};

/// Byte range of a value inside the source text it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// How a scalar was written in its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` or `>` block scalar.
    Block,
}

/// Leaf value of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    /// Integer above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    String(String),
}

/// The three shapes a node can take.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered mapping with unique keys.
    Mapping(Vec<(String, Node)>),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

/// Where a node came from in the source text.
///
/// `prefix` is written before any replacement text. Block nodes and implicit
/// nulls span from right after their `:` or `-` indicator, so they need the
/// separating space back; an implicit null in a flow mapping (`{a}`) needs the
/// whole `": "`. `flow` is set when the node sits inside a `[...]` or `{...}`
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Origin {
    pub span: Span,
    pub style: ScalarStyle,
    pub prefix: &'static str,
    pub flow: bool,
}

/// A node of a loaded document.
///
/// Nodes loaded from YAML remember their source span so that overwritten
/// values can be spliced back into the original text.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    origin: Option<Origin>,
    replaced: bool,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            origin: None,
            replaced: false,
        }
    }

    pub(crate) fn with_origin(kind: NodeKind, origin: Origin) -> Self {
        Self {
            kind,
            origin: Some(origin),
            replaced: false,
        }
    }

    pub fn mapping(entries: Vec<(String, Node)>) -> Self {
        Self::new(NodeKind::Mapping(entries))
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Self::new(NodeKind::Sequence(items))
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Self::new(NodeKind::Scalar(scalar))
    }

    pub fn null() -> Self {
        Self::scalar(Scalar::Null)
    }

    pub(crate) fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub(crate) fn is_replaced(&self) -> bool {
        self.replaced
    }

    /// Overwrite this node in place, keeping its source location so the
    /// dumper knows which text to replace.
    pub fn overwrite(&mut self, mut value: Node) {
        value.origin = self.origin;
        value.replaced = true;
        *self = value;
    }

    /// Look up a mapping entry. Returns `None` for non-mappings.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.kind {
            NodeKind::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        match &mut self.kind {
            NodeKind::Mapping(entries) => entries
                .iter_mut()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(String, Node)]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar(Scalar::Null))
    }

    /// Human-readable description of the node's shape, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Mapping(_) => "a mapping",
            NodeKind::Sequence(_) => "a list",
            NodeKind::Scalar(Scalar::Null) => "null",
            NodeKind::Scalar(Scalar::Bool(_)) => "a boolean",
            NodeKind::Scalar(Scalar::Integer(_) | Scalar::Unsigned(_) | Scalar::Float(_)) => {
                "a number"
            }
            NodeKind::Scalar(Scalar::String(_)) => "a string",
        }
    }

    /// Convert into a `serde_json::Value`, keeping key order.
    pub fn to_json(&self) -> Value {
        match &self.kind {
            NodeKind::Mapping(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                Value::Object(map)
            }
            NodeKind::Sequence(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            NodeKind::Scalar(Scalar::Null) => Value::Null,
            NodeKind::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            NodeKind::Scalar(Scalar::Integer(i)) => Value::Number(Number::from(*i)),
            NodeKind::Scalar(Scalar::Unsigned(u)) => Value::Number(Number::from(*u)),
            NodeKind::Scalar(Scalar::Float(f)) => {
                Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
            NodeKind::Scalar(Scalar::String(s)) => Value::String(s.clone()),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::scalar(Scalar::Bool(b)),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Node::scalar(Scalar::Integer(i)),
                (None, Some(u)) => Node::scalar(Scalar::Unsigned(u)),
                (None, None) => Node::scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Node::scalar(Scalar::String(s)),
            Value::Array(items) => Node::sequence(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => {
                Node::mapping(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::scalar(Scalar::String(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::scalar(Scalar::Integer(value))
    }
}
