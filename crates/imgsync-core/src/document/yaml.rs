//! YAML loading with source spans, and format-preserving writes.
//!
//! Loading walks the marked event stream of `yaml-rust2` and records, for
//! every node, the byte range it occupies in the source text. Writing never
//! re-serializes a loaded document: each overwritten node's range is replaced
//! with the rendered new value and every other byte is copied through, so
//! comments, quoting and layout survive untouched. The spliced text is parsed
//! again and must read back as the edited tree before it is handed out.
//!
//! Event markers do not always point at the node they belong to. An implicit
//! null is reported at the next token, a block mapping at its first `:` and a
//! block scalar after its header line, so those nodes are located from the
//! `:` or `-` indicator that introduces them instead.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::RegexSet;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::node::{Node, NodeKind, Origin, Scalar, ScalarStyle, Span};

#[derive(Debug)]
pub(crate) enum YamlError {
    Syntax(String),
    DuplicateKey(String),
    ComplexKey,
    Unlocatable,
}

#[derive(Default)]
struct EventSink {
    events: Vec<(Event, Marker)>,
}

impl MarkedEventReceiver for EventSink {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        self.events.push((ev, mark));
    }
}

/// Parse the first document of `source`.
pub(crate) fn parse(source: &str) -> Result<Node, YamlError> {
    let mut sink = EventSink::default();
    Parser::new(source.chars())
        .load(&mut sink, false)
        .map_err(|e| YamlError::Syntax(e.to_string()))?;
    Builder::new(source, sink.events).document()
}

/// Render `root` by splicing its overwritten nodes into `source`.
pub(crate) fn render(source: &str, root: &Node) -> Result<String, YamlError> {
    let mut edits = Vec::new();
    collect_edits(root, &mut edits)?;
    if edits.is_empty() {
        return Ok(source.to_string());
    }
    edits.sort_by_key(|(span, _)| span.start);
    edits.dedup();

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, text) in edits {
        if span.start < cursor || span.end > source.len() {
            return Err(YamlError::Unlocatable);
        }
        out.push_str(&source[cursor..span.start]);
        out.push_str(&text);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);

    match parse(&out) {
        Ok(written) if same_tree(&written, root) => Ok(out),
        _ => Err(YamlError::Unlocatable),
    }
}

/// Structural equality that also treats NaN as equal to itself.
fn same_tree(a: &Node, b: &Node) -> bool {
    match (&a.kind, &b.kind) {
        (NodeKind::Mapping(x), NodeKind::Mapping(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((ka, va), (kb, vb))| ka == kb && same_tree(va, vb))
        }
        (NodeKind::Sequence(x), NodeKind::Sequence(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(va, vb)| same_tree(va, vb))
        }
        (NodeKind::Scalar(Scalar::Float(x)), NodeKind::Scalar(Scalar::Float(y))) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        (x, y) => x == y,
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Root,
    Key,
    /// Mapping value; the key occupies `key_start..key_end`.
    Value { key_start: usize, key_end: usize },
    /// Sequence item; its `-` is the first token at or after `from`.
    Item { from: usize },
}

/// The `:` or `-` indicator a node follows.
#[derive(Clone, Copy)]
struct Lead {
    /// Byte right after the indicator.
    after: usize,
    /// Column of the owning key or `-`. Block content is indented past it.
    column: usize,
}

struct Builder<'a> {
    source: &'a str,
    /// Byte offset of every char index, plus one past the end.
    offsets: Vec<usize>,
    events: std::vec::IntoIter<(Event, Marker)>,
    anchors: HashMap<usize, Node>,
}

impl<'a> Builder<'a> {
    fn new(source: &'a str, events: Vec<(Event, Marker)>) -> Self {
        let offsets = source
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(source.len()))
            .collect();
        Self {
            source,
            offsets,
            events: events.into_iter(),
            anchors: HashMap::new(),
        }
    }

    fn byte_at(&self, mark: &Marker) -> usize {
        self.offsets
            .get(mark.index())
            .copied()
            .unwrap_or(self.source.len())
    }

    fn next(&mut self) -> Result<(Event, Marker), YamlError> {
        self.events
            .next()
            .ok_or_else(|| YamlError::Syntax("unexpected end of document".to_string()))
    }

    fn document(&mut self) -> Result<Node, YamlError> {
        loop {
            let (event, mark) = self.next()?;
            match event {
                Event::StreamEnd | Event::DocumentEnd => return Ok(Node::null()),
                Event::Scalar(..)
                | Event::SequenceStart(..)
                | Event::MappingStart(..)
                | Event::Alias(..) => return self.node(event, mark, Slot::Root, false),
                _ => continue,
            }
        }
    }

    fn node(&mut self, event: Event, mark: Marker, slot: Slot, flow: bool) -> Result<Node, YamlError> {
        let start = self.byte_at(&mark);
        let lead = self.lead(slot, flow);
        match event {
            Event::Scalar(value, style, anchor, ..) => {
                let node = self.scalar(value, style, start, slot, lead, flow);
                self.remember(anchor, &node);
                Ok(node)
            }
            Event::SequenceStart(anchor, ..) => {
                let is_flow = self.source[start..].starts_with('[');
                let mut items: Vec<Node> = Vec::new();
                let mut end = start;
                let end_mark = loop {
                    let (ev, m) = self.next()?;
                    if matches!(ev, Event::SequenceEnd) {
                        break m;
                    }
                    let item = self.node(ev, m, Slot::Item { from: end }, flow || is_flow)?;
                    end = end.max(item.origin().map_or(end, |o| o.span.end));
                    items.push(item);
                };
                let origin = if is_flow {
                    spanned(start, self.flow_end(&end_mark, ']'), flow)
                } else {
                    block_origin(lead, start, end, flow)
                };
                let node = Node::with_origin(NodeKind::Sequence(items), origin);
                self.remember(anchor, &node);
                Ok(node)
            }
            Event::MappingStart(anchor, ..) => {
                let is_flow = self.source[start..].starts_with('{');
                let inner_flow = flow || is_flow;
                let mut entries: Vec<(String, Node)> = Vec::new();
                let mut first: Option<usize> = None;
                let mut end = start;
                let end_mark = loop {
                    let (ev, m) = self.next()?;
                    if matches!(ev, Event::MappingEnd) {
                        break m;
                    }
                    let key_node = self.node(ev, m, Slot::Key, inner_flow)?;
                    let key = match &key_node.kind {
                        NodeKind::Scalar(scalar) => key_text(scalar),
                        _ => return Err(YamlError::ComplexKey),
                    };
                    let key_span = key_node.origin().map_or(Span::new(start, start), |o| o.span);
                    let (ev, m) = self.next()?;
                    let slot = Slot::Value {
                        key_start: key_span.start,
                        key_end: key_span.end,
                    };
                    let value = self.node(ev, m, slot, inner_flow)?;
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(YamlError::DuplicateKey(key));
                    }
                    first.get_or_insert(key_span.start);
                    end = end
                        .max(key_span.end)
                        .max(value.origin().map_or(end, |o| o.span.end));
                    entries.push((key, value));
                };
                let origin = if is_flow {
                    spanned(start, self.flow_end(&end_mark, '}'), flow)
                } else {
                    block_origin(lead, first.unwrap_or(start), end, flow)
                };
                let node = Node::with_origin(NodeKind::Mapping(entries), origin);
                self.remember(anchor, &node);
                Ok(node)
            }
            Event::Alias(id) => {
                let target = self
                    .anchors
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| YamlError::Syntax(format!("unknown alias at byte {start}")))?;
                let end = alias_end(self.source, start);
                Ok(Node::with_origin(target.kind, spanned(start, end, flow)))
            }
            other => Err(YamlError::Syntax(format!("unexpected event {other:?}"))),
        }
    }

    fn scalar(
        &self,
        value: String,
        style: TScalarStyle,
        start: usize,
        slot: Slot,
        lead: Option<Lead>,
        flow: bool,
    ) -> Node {
        let style = match style {
            TScalarStyle::Plain => ScalarStyle::Plain,
            TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
            TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            _ => ScalarStyle::Block,
        };
        // yaml-rust2 reports `key:` as a plain "~" marked at the next token,
        // or as "" when the empty value carries an anchor or tag.
        let implicit = style == ScalarStyle::Plain
            && (value.is_empty()
                || (value == "~" && self.source.as_bytes().get(start) != Some(&b'~')));
        let scalar = match style {
            ScalarStyle::Plain => resolve_plain(&value),
            _ => Scalar::String(value.clone()),
        };
        let at = |span: Span, prefix: &'static str| Origin {
            span,
            style,
            prefix,
            flow,
        };

        let origin = if implicit {
            match (lead, slot) {
                (Some(lead), _) => {
                    let point = self.skip_properties(lead.after);
                    Some(at(Span::new(point, point), " "))
                }
                (None, Slot::Value { key_end, .. }) => Some(at(Span::new(key_end, key_end), ": ")),
                _ => None,
            }
        } else {
            match style {
                ScalarStyle::Plain => Some(at(
                    Span::new(start, plain_end(self.source, start, &value, flow)),
                    "",
                )),
                ScalarStyle::SingleQuoted => {
                    Some(at(Span::new(start, quoted_end(self.source, start, '\'')), ""))
                }
                ScalarStyle::DoubleQuoted => {
                    Some(at(Span::new(start, quoted_end(self.source, start, '"')), ""))
                }
                ScalarStyle::Block => lead.and_then(|lead| {
                    let header = self.block_header(lead.after)?;
                    let end = block_end(self.source, header, lead.column);
                    Some(at(Span::new(lead.after, end), " "))
                }),
            }
        };
        match origin {
            Some(origin) => Node::with_origin(NodeKind::Scalar(scalar), origin),
            None => Node::scalar(scalar),
        }
    }

    /// Locate the indicator introducing a node in `slot`.
    fn lead(&self, slot: Slot, flow: bool) -> Option<Lead> {
        let bytes = self.source.as_bytes();
        match slot {
            Slot::Value { key_start, key_end } => {
                let at = next_token(self.source, key_end)?;
                (bytes[at] == b':').then(|| Lead {
                    after: at + 1,
                    column: self.column(key_start),
                })
            }
            Slot::Item { from } if !flow => {
                let at = next_token(self.source, from)?;
                (bytes[at] == b'-').then(|| Lead {
                    after: at + 1,
                    column: self.column(at),
                })
            }
            _ => None,
        }
    }

    fn column(&self, at: usize) -> usize {
        at - self.source[..at].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Skip `&anchor` and `!tag` properties following `at` on its line.
    fn skip_properties(&self, mut at: usize) -> usize {
        let bytes = self.source.as_bytes();
        loop {
            let mut p = at;
            while matches!(bytes.get(p), Some(b' ' | b'\t')) {
                p += 1;
            }
            if !matches!(bytes.get(p), Some(b'&' | b'!')) {
                return at;
            }
            while p < bytes.len() && !bytes[p].is_ascii_whitespace() {
                p += 1;
            }
            at = p;
        }
    }

    /// Position of the `|` or `>` header of a block scalar following `after`.
    fn block_header(&self, after: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let mut at = self.skip_properties(after);
        while matches!(bytes.get(at), Some(b' ' | b'\t')) {
            at += 1;
        }
        matches!(bytes.get(at), Some(b'|' | b'>')).then_some(at)
    }

    fn flow_end(&self, end_mark: &Marker, close: char) -> usize {
        let at = self.byte_at(end_mark);
        self.source[at..]
            .find(close)
            .map_or(at, |i| at + i + close.len_utf8())
    }

    fn remember(&mut self, anchor: usize, node: &Node) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
    }
}

fn spanned(start: usize, end: usize, flow: bool) -> Origin {
    Origin {
        span: Span::new(start, end),
        style: ScalarStyle::Plain,
        prefix: "",
        flow,
    }
}

/// A block collection runs from its indicator to the end of its last child.
fn block_origin(lead: Option<Lead>, start: usize, end: usize, flow: bool) -> Origin {
    match lead {
        Some(lead) => Origin {
            span: Span::new(lead.after, end.max(lead.after)),
            style: ScalarStyle::Plain,
            prefix: " ",
            flow,
        },
        None => spanned(start, end.max(start), flow),
    }
}

/// First byte at or after `from` that is neither whitespace nor comment.
fn next_token(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'#' if i == 0 || bytes[i - 1].is_ascii_whitespace() => {
                i = src[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            _ => return Some(i),
        }
    }
    None
}

fn key_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => "null".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Unsigned(u) => u.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::String(s) => s.clone(),
    }
}

/// YAML 1.2 core schema resolution of a plain scalar.
pub(crate) fn resolve_plain(value: &str) -> Scalar {
    match value {
        "" | "~" | "null" | "Null" | "NULL" => return Scalar::Null,
        "true" | "True" | "TRUE" => return Scalar::Bool(true),
        "false" | "False" | "FALSE" => return Scalar::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return Scalar::Float(f64::INFINITY)
        }
        "-.inf" | "-.Inf" | "-.INF" => return Scalar::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Scalar::Float(f64::NAN),
        _ => {}
    }
    if let Some(integer) = parse_integer(value) {
        return integer;
    }
    if looks_like_float(value) {
        if let Ok(f) = value.parse::<f64>() {
            return Scalar::Float(f);
        }
    }
    Scalar::String(value.to_string())
}

fn parse_integer(value: &str) -> Option<Scalar> {
    if let Some(hex) = value.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(Scalar::Integer);
    }
    if let Some(oct) = value.strip_prefix("0o") {
        return i64::from_str_radix(oct, 8).ok().map(Scalar::Integer);
    }
    let digits = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match value.parse::<i64>() {
        Ok(i) => Some(Scalar::Integer(i)),
        Err(_) => value.parse::<u64>().ok().map(Scalar::Unsigned),
    }
}

fn looks_like_float(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit())
        && value.contains(['.', 'e', 'E'])
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
}

/// End of the plain scalar starting at `from` on its first line.
fn plain_line_end(src: &str, from: usize, flow: bool) -> usize {
    let rest = &src[from..];
    let mut stop = rest.len();
    let mut prev: Option<char> = None;
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        let ends = match c {
            '\n' | '\r' => true,
            '#' => matches!(prev, Some(' ') | Some('\t')),
            ':' => next.map_or(true, |n| n.is_whitespace() || (flow && ",[]{}".contains(n))),
            ',' | '[' | ']' | '{' | '}' => flow,
            _ => false,
        };
        if ends {
            stop = i;
            break;
        }
        prev = Some(c);
    }
    from + rest[..stop].trim_end_matches(|c: char| c == ' ' || c == '\t').len()
}

fn fold(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// End of a plain scalar, following folded continuation lines until the
/// source text accounts for the whole parsed value.
fn plain_end(src: &str, start: usize, value: &str, flow: bool) -> usize {
    let target = fold(value);
    let mut end = plain_line_end(src, start, flow);
    let mut cursor = end;
    while fold(&src[start..end]) != target {
        let Some(offset) = src[cursor..].find('\n') else {
            break;
        };
        let line_start = cursor + offset + 1;
        let line_stop = plain_line_end(src, line_start, flow);
        cursor = line_stop.max(line_start);
        if src[line_start..line_stop].trim().is_empty() {
            if cursor >= src.len() {
                break;
            }
            continue;
        }
        if !target.starts_with(fold(&src[start..line_stop]).as_str()) {
            break;
        }
        end = line_stop;
    }
    end
}

fn quoted_end(src: &str, start: usize, quote: char) -> usize {
    let mut chars = src[start..].char_indices();
    match chars.next() {
        Some((_, c)) if c == quote => {}
        _ => return plain_line_end(src, start, false),
    }
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
            continue;
        }
        if c == quote {
            if quote == '\'' && src[start + i + 1..].starts_with('\'') {
                chars.next();
                continue;
            }
            return start + i + 1;
        }
    }
    src.len()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// End of the block scalar whose `|` / `>` header sits at `header`: the rest
/// of the header line plus every following line indented past `column`.
/// Trailing blank lines stay outside the span.
fn block_end(src: &str, header: usize, column: usize) -> usize {
    let mut end = src[header..].find('\n').map_or(src.len(), |i| header + i);
    let mut cursor = end;
    while cursor < src.len() {
        let line_begin = cursor + 1;
        let line_stop = src[line_begin..]
            .find('\n')
            .map_or(src.len(), |i| line_begin + i);
        let line = &src[line_begin..line_stop];
        cursor = line_stop;
        if line.trim().is_empty() {
            continue;
        }
        if indentation(line) <= column {
            break;
        }
        end = line_begin + line.trim_end().len();
    }
    end
}

fn alias_end(src: &str, start: usize) -> usize {
    src[start + 1..]
        .char_indices()
        .find(|&(_, c)| c.is_whitespace() || ",[]{}".contains(c))
        .map_or(src.len(), |(i, _)| start + 1 + i)
}

fn collect_edits(node: &Node, edits: &mut Vec<(Span, String)>) -> Result<(), YamlError> {
    if node.is_replaced() {
        let origin = node.origin().ok_or(YamlError::Unlocatable)?;
        let text = render_inline(node, origin.style, origin.flow);
        edits.push((origin.span, format!("{}{text}", origin.prefix)));
        return Ok(());
    }
    match &node.kind {
        NodeKind::Mapping(entries) => {
            for (_, value) in entries {
                collect_edits(value, edits)?;
            }
        }
        NodeKind::Sequence(items) => {
            for item in items {
                collect_edits(item, edits)?;
            }
        }
        NodeKind::Scalar(_) => {}
    }
    Ok(())
}

fn render_inline(node: &Node, style: ScalarStyle, flow: bool) -> String {
    match &node.kind {
        NodeKind::Scalar(Scalar::String(s)) => render_string(s, style, flow),
        NodeKind::Scalar(other) => render_scalar(other),
        NodeKind::Mapping(entries) if entries.is_empty() => "{}".to_string(),
        NodeKind::Sequence(items) if items.is_empty() => "[]".to_string(),
        // JSON is valid flow YAML.
        _ => node.to_json().to_string(),
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => "null".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Unsigned(u) => u.to_string(),
        Scalar::Float(f) if f.is_nan() => ".nan".to_string(),
        Scalar::Float(f) if f.is_infinite() => {
            if *f > 0.0 { ".inf" } else { "-.inf" }.to_string()
        }
        Scalar::Float(f) => format!("{f:?}"),
        Scalar::String(s) => render_string(s, ScalarStyle::Plain, false),
    }
}

/// Render a string keeping the quoting style of the value it replaces,
/// falling back to double quotes when a plain scalar would change meaning.
fn render_string(s: &str, style: ScalarStyle, flow: bool) -> String {
    match style {
        ScalarStyle::SingleQuoted if !s.contains('\n') => format!("'{}'", s.replace('\'', "''")),
        ScalarStyle::DoubleQuoted => double_quoted(s),
        _ if is_plain_safe(s, flow) => s.to_string(),
        _ => double_quoted(s),
    }
}

/// Plain scalars a YAML 1.1 reader resolves to something other than a string.
/// Written files are read by tools on either schema version.
static YAML11_NON_STRINGS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"^(?:y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF)$",
        r"^(?:~|null|Null|NULL)$",
        r"^[-+]?(?:0b[01_]+|0[0-7_]+|(?:0|[1-9][0-9_]*)|0x[0-9a-fA-F_]+|[1-9][0-9_]*(?::[0-5]?[0-9])+)$",
        r"^(?:[-+]?[0-9][0-9_]*\.[0-9_]*(?:[eE][-+]?[0-9]+)?|\.[0-9_]+(?:[eE][-+]?[0-9]+)?|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
        r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}(?:(?:[Tt]|[ \t]+)[0-9]{1,2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9]{1,2}(?::[0-9]{2})?))?)?$",
        r"^(?:<<|=)$",
    ])
    .expect("valid YAML 1.1 resolver patterns")
});

fn is_plain_safe(s: &str, flow: bool) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !matches!(resolve_plain(s), Scalar::String(_)) || s.trim() != s {
        return false;
    }
    if YAML11_NON_STRINGS.is_match(s) {
        return false;
    }
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        let continues = chars.next().map_or(false, |c| !c.is_whitespace());
        if !(matches!(first, '-' | '?' | ':') && continues) {
            return false;
        }
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return false;
    }
    if s.chars().any(char::is_control) {
        return false;
    }
    !(flow && s.contains([',', '[', ']', '{', '}']))
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overwrite(root: &mut Node, keys: &[&str], value: &str) {
        let mut node = root;
        for key in keys {
            node = node.get_mut(key).expect("key present");
        }
        node.overwrite(Node::from(value));
    }

    #[test]
    fn parse_builds_typed_tree() {
        let root = parse("name: app\nreplicas: 3\nratio: 0.5\nenabled: true\nnothing: ~\nitems:\n  - a\n  - 'b'\n").unwrap();
        assert_eq!(root.get("name").unwrap().as_str(), Some("app"));
        assert_eq!(root.get("replicas").unwrap().kind, NodeKind::Scalar(Scalar::Integer(3)));
        assert_eq!(root.get("ratio").unwrap().kind, NodeKind::Scalar(Scalar::Float(0.5)));
        assert_eq!(root.get("enabled").unwrap().kind, NodeKind::Scalar(Scalar::Bool(true)));
        assert!(root.get("nothing").unwrap().is_null());
        assert_eq!(root.get("items").unwrap().as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn version_like_strings_stay_strings() {
        let root = parse("tag: 1.2.3\n").unwrap();
        assert_eq!(root.get("tag").unwrap().as_str(), Some("1.2.3"));
    }

    #[test]
    fn render_without_edits_is_identity() {
        let source = "# comment\na: 1   # trailing\nb:\n- x\n- \"y\"\n";
        let root = parse(source).unwrap();
        assert_eq!(render(source, &root).unwrap(), source);
    }

    #[test]
    fn render_keeps_comments_and_double_quotes() {
        let source = "# header\nspec:\n  image: \"old/image:1.0\"   # pinned\n  other: 'keep'\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["spec", "image"], "new/image:2.0");
        assert_eq!(
            render(source, &root).unwrap(),
            "# header\nspec:\n  image: \"new/image:2.0\"   # pinned\n  other: 'keep'\n"
        );
    }

    #[test]
    fn render_keeps_single_quotes() {
        let source = "command: 'old'\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["command"], "bash -c 'run'");
        assert_eq!(render(source, &root).unwrap(), "command: 'bash -c ''run'''\n");
    }

    #[test]
    fn render_plain_value_stays_plain() {
        let source = "resources:\n  oci-image:\n    upstream-source: old:1.0 # bumped by ci\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["resources", "oci-image", "upstream-source"], "ghcr.io/x/y:2.0.0");
        assert_eq!(
            render(source, &root).unwrap(),
            "resources:\n  oci-image:\n    upstream-source: ghcr.io/x/y:2.0.0 # bumped by ci\n"
        );
    }

    #[test]
    fn render_quotes_plain_values_that_would_retype() {
        let source = "user: nobody\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["user"], "1000");
        assert_eq!(render(source, &root).unwrap(), "user: \"1000\"\n");
    }

    #[test]
    fn render_fills_implicit_null() {
        let source = "user:\ncommand: run\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["user"], "_daemon_");
        assert_eq!(render(source, &root).unwrap(), "user: _daemon_\ncommand: run\n");
    }

    #[test]
    fn render_replaces_block_scalar() {
        let source = "command: |\n  echo one\n  echo two\nnext: 1\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["command"], "run");
        assert_eq!(render(source, &root).unwrap(), "command: run\nnext: 1\n");
    }

    #[test]
    fn render_inside_flow_collection() {
        let source = "containers: [{image: old, name: app}]\n";
        let mut root = parse(source).unwrap();
        let containers = root.get_mut("containers").unwrap();
        if let NodeKind::Sequence(items) = &mut containers.kind {
            items[0].get_mut("image").unwrap().overwrite(Node::from("nginx"));
        }
        assert_eq!(
            render(source, &root).unwrap(),
            "containers: [{image: nginx, name: app}]\n"
        );
    }

    #[test]
    fn render_keeps_long_lines_unwrapped() {
        let long = "x".repeat(300);
        let source = "image: short\n";
        let mut root = parse(source).unwrap();
        overwrite(&mut root, &["image"], &long);
        assert_eq!(render(source, &root).unwrap(), format!("image: {long}\n"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        assert!(matches!(parse("a: 1\na: 2\n"), Err(YamlError::DuplicateKey(k)) if k == "a"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(parse("a: [1, 2\n"), Err(YamlError::Syntax(_))));
    }

    #[test]
    fn empty_source_is_null_document() {
        assert!(parse("").unwrap().is_null());
    }

    fn set(source: &str, keys: &[&str], value: &str) -> String {
        let mut root = parse(source).unwrap();
        overwrite(&mut root, keys, value);
        render(source, &root).unwrap()
    }

    #[test]
    fn implicit_null_before_comment_keeps_comment() {
        assert_eq!(
            set("user: # set by ci\ncommand: serve\n", &["user"], "_daemon_"),
            "user: _daemon_ # set by ci\ncommand: serve\n"
        );
    }

    #[test]
    fn implicit_null_with_anchor_is_filled_after_it() {
        assert_eq!(set("user: &u\nnext: 1\n", &["user"], "root"), "user: &u root\nnext: 1\n");
    }

    #[test]
    fn empty_sequence_item_is_filled() {
        let source = "list:\n  -\n  - b\n";
        let mut root = parse(source).unwrap();
        if let NodeKind::Sequence(items) = &mut root.get_mut("list").unwrap().kind {
            assert!(items[0].is_null());
            items[0].overwrite(Node::from("a"));
        }
        assert_eq!(render(source, &root).unwrap(), "list:\n  - a\n  - b\n");
    }

    #[test]
    fn implicit_null_in_flow_mapping_gets_its_colon() {
        assert_eq!(set("spec: {user, b: 1}\n", &["spec", "user"], "x"), "spec: {user: x, b: 1}\n");
    }

    #[test]
    fn render_replaces_indentless_sequence() {
        assert_eq!(
            set("command:\n- /bin/sh\n- -c\nuser: app\n", &["command"], "serve"),
            "command: serve\nuser: app\n"
        );
    }

    #[test]
    fn render_replaces_block_mapping() {
        assert_eq!(
            set("spec:\n  a: 1\n  b: 2\nnext: 1\n", &["spec"], "none"),
            "spec: none\nnext: 1\n"
        );
    }

    #[test]
    fn render_replaces_folded_scalar_keeping_blank_tail() {
        assert_eq!(set("cmd: >\n  a\n  b\n\nnext: 1\n", &["cmd"], "x"), "cmd: x\n\nnext: 1\n");
    }

    #[test]
    fn render_replaces_keep_chomped_literal() {
        assert_eq!(set("cmd: |+\n  a\n\n", &["cmd"], "x"), "cmd: x\n\n");
    }

    #[test]
    fn render_replaces_block_scalar_under_sequence_item() {
        let source = "- name: app\n  command: |\n    one\n    two\n  user: root\n- name: other\n";
        let mut root = parse(source).unwrap();
        if let NodeKind::Sequence(items) = &mut root.kind {
            items[0].get_mut("command").unwrap().overwrite(Node::from("run"));
        }
        assert_eq!(
            render(source, &root).unwrap(),
            "- name: app\n  command: run\n  user: root\n- name: other\n"
        );
    }

    #[test]
    fn render_rejects_text_that_reads_back_differently() {
        let source = "a: 1\nb: 2\n";
        let mut root = parse(source).unwrap();
        root.get_mut("a").unwrap().overwrite(Node::from("x"));
        // The replacement lands in the right place, but the tree no longer
        // matches what the new text means.
        if let NodeKind::Mapping(entries) = &mut root.kind {
            entries.push(("c".to_string(), Node::from("absent")));
        }
        assert!(matches!(render(source, &root), Err(YamlError::Unlocatable)));
    }

    #[test]
    fn documents_with_nan_can_still_be_edited() {
        assert_eq!(set("a: .nan\nb: old\n", &["b"], "new"), "a: .nan\nb: new\n");
    }

    #[test]
    fn large_integers_are_unsigned() {
        let root = parse("id: 18446744073709551615\n").unwrap();
        assert_eq!(root.get("id").unwrap().kind, NodeKind::Scalar(Scalar::Unsigned(u64::MAX)));
    }

    #[test]
    fn yaml11_booleans_and_numbers_are_quoted() {
        for value in ["yes", "No", "on", "OFF", "y", "1_000", "0b101", "017", "1:20", "2024-01-02", "<<"] {
            assert_eq!(set("user: nobody\n", &["user"], value), format!("user: \"{value}\"\n"));
        }
    }

    #[test]
    fn plain_safety_rules() {
        assert!(is_plain_safe("ghcr.io/x/y:2.0.0", false));
        assert!(is_plain_safe("bash -c 'echo hello'", false));
        assert!(!is_plain_safe("", false));
        assert!(!is_plain_safe("true", false));
        assert!(!is_plain_safe("a: b", false));
        assert!(!is_plain_safe("- item", false));
        assert!(!is_plain_safe("a,b", true));
        assert!(is_plain_safe("a,b", false));
        assert!(!is_plain_safe("yes", false));
        assert!(!is_plain_safe("12:30:45", false));
        assert!(is_plain_safe("1.2.3", false));
        assert!(is_plain_safe("yesterday", false));
    }
}
