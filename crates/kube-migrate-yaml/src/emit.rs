use std::collections::HashSet;
use std::fmt::Write as _;

use crate::tree::{CollectionStyle, Node, NodeId, ScalarStyle, Stream, Tree, resolve_plain};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("mapping {node} has a key without a value")]
    UnpairedMapping { node: NodeId },

    #[error("node {node} does not belong to this tree")]
    DanglingNode { node: NodeId },

    #[error("node {node} is not a document")]
    NotADocument { node: NodeId },

    #[error("document {node} is nested inside another node")]
    NestedDocument { node: NodeId },

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

/// Writes trees back out as block-style YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitter {
    indent: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl Emitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spaces per nesting level of block collections.
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent.clamp(1, 9);
        self
    }

    /// Serialize all documents, separated by `---`.
    ///
    /// An empty document writes no text of its own, so once the stream holds
    /// one, every document is opened with `---` to keep the count intact.
    ///
    /// # Errors
    ///
    /// Returns an [`EmitError`] if the tree breaks a structural invariant.
    pub fn emit_stream(&self, stream: &Stream) -> Result<String, EmitError> {
        let explicit_starts = stream
            .documents
            .iter()
            .any(|document| is_empty_document(&stream.tree, *document));
        let mut writer = Writer::new(&stream.tree, self.indent);
        for (idx, document) in stream.documents.iter().enumerate() {
            if idx > 0 || explicit_starts {
                writer.out.push_str("---\n");
            }
            writer.write_document(*document)?;
        }
        Ok(writer.out)
    }

    /// Serialize a single document node.
    ///
    /// # Errors
    ///
    /// Returns an [`EmitError`] if `document` is not a document node or the
    /// tree breaks a structural invariant.
    pub fn emit_document(&self, tree: &Tree, document: NodeId) -> Result<String, EmitError> {
        let mut writer = Writer::new(tree, self.indent);
        writer.write_document(document)?;
        Ok(writer.out)
    }
}

/// Serialize `stream` with the default two-space indentation.
///
/// # Errors
///
/// Returns an [`EmitError`] if the tree breaks a structural invariant.
pub fn emit_stream(stream: &Stream) -> Result<String, EmitError> {
    Emitter::default().emit_stream(stream)
}

#[derive(Debug, Clone, Copy)]
enum Context {
    Root,
    /// Right after `key:` where the key starts at `col`.
    MappingValue { col: usize },
    /// Right after `-` at `col`.
    SequenceItem { col: usize },
}

enum Props {
    Alias(String),
    Prefix(String),
}

struct Writer<'a> {
    tree: &'a Tree,
    indent: usize,
    out: String,
    anchored: HashSet<NodeId>,
}

impl<'a> Writer<'a> {
    fn new(tree: &'a Tree, indent: usize) -> Self {
        Self {
            tree,
            indent,
            out: String::new(),
            anchored: HashSet::new(),
        }
    }

    fn lookup(&self, id: NodeId) -> Result<&'a Node, EmitError> {
        self.tree
            .get(id)
            .ok_or(EmitError::DanglingNode { node: id })
    }

    fn pad(&mut self, col: usize) {
        self.out.extend(std::iter::repeat_n(' ', col));
    }

    /// Anchor and tag to put in front of a node, or the alias that replaces it
    /// when an anchored node shows up a second time.
    fn props(&mut self, id: NodeId, node: &Node) -> Props {
        let mut prefix = String::new();
        if let Some(anchor) = self.tree.anchor(id) {
            if !self.anchored.insert(id) {
                return Props::Alias(format!("*{anchor}"));
            }
            prefix.push('&');
            prefix.push_str(anchor);
            prefix.push(' ');
        }
        if let Node::Scalar { tag: Some(tag), .. } = node {
            prefix.push_str(tag);
            prefix.push(' ');
        }
        Props::Prefix(prefix)
    }

    fn write_document(&mut self, id: NodeId) -> Result<(), EmitError> {
        let Node::Document { content } = self.lookup(id)? else {
            return Err(EmitError::NotADocument { node: id });
        };
        self.anchored.clear();
        for root in content {
            self.write_node(*root, Context::Root)?;
        }
        Ok(())
    }

    fn write_node(&mut self, id: NodeId, ctx: Context) -> Result<(), EmitError> {
        let node = self.lookup(id)?;
        let lead = if matches!(ctx, Context::Root) { "" } else { " " };
        let prefix = match self.props(id, node) {
            Props::Alias(alias) => {
                writeln!(self.out, "{lead}{alias}")?;
                return Ok(());
            }
            Props::Prefix(prefix) => prefix,
        };

        match node {
            Node::Document { .. } => Err(EmitError::NestedDocument { node: id }),
            Node::Mapping {
                content,
                style: CollectionStyle::Block,
            }
            | Node::Sequence {
                content,
                style: CollectionStyle::Block,
            } if !content.is_empty() => {
                let is_mapping = matches!(node, Node::Mapping { .. });
                let (col, inline) = match ctx {
                    Context::Root => (0, false),
                    Context::MappingValue { col } => (col + self.indent, false),
                    Context::SequenceItem { col } => (col + 2, prefix.is_empty()),
                };
                if inline {
                    self.out.push(' ');
                } else if !(matches!(ctx, Context::Root) && prefix.is_empty()) {
                    writeln!(self.out, "{}", format!("{lead}{prefix}").trim_end())?;
                }
                if is_mapping {
                    self.write_mapping(id, content, col, inline)
                } else {
                    self.write_sequence(content, col, inline)
                }
            }
            Node::Scalar { value, style, .. } if value.is_empty() && *style == ScalarStyle::Plain => {
                let line = format!("{lead}{prefix}");
                if !(matches!(ctx, Context::Root) && line.is_empty()) {
                    writeln!(self.out, "{}", line.trim_end())?;
                }
                Ok(())
            }
            Node::Scalar { value, style, .. }
                if matches!(style, ScalarStyle::Literal | ScalarStyle::Folded)
                    && fits_block_scalar(value) =>
            {
                let col = match ctx {
                    Context::Root => self.indent,
                    Context::MappingValue { col } | Context::SequenceItem { col } => {
                        col + self.indent
                    }
                };
                write!(self.out, "{lead}{prefix}")?;
                self.write_block_scalar(value, col)
            }
            _ => {
                let text = self.inline_text(id, node, false)?;
                writeln!(self.out, "{lead}{prefix}{text}")?;
                Ok(())
            }
        }
    }

    fn write_mapping(
        &mut self,
        id: NodeId,
        content: &[NodeId],
        col: usize,
        inline_first: bool,
    ) -> Result<(), EmitError> {
        if content.len() % 2 != 0 {
            return Err(EmitError::UnpairedMapping { node: id });
        }
        for (idx, pair) in content.chunks_exact(2).enumerate() {
            if idx > 0 || !inline_first {
                self.pad(col);
            }
            let key = self.key_text(pair[0])?;
            write!(self.out, "{key}:")?;
            self.write_node(pair[1], Context::MappingValue { col })?;
        }
        Ok(())
    }

    fn write_sequence(
        &mut self,
        content: &[NodeId],
        col: usize,
        inline_first: bool,
    ) -> Result<(), EmitError> {
        for (idx, item) in content.iter().enumerate() {
            if idx > 0 || !inline_first {
                self.pad(col);
            }
            self.out.push('-');
            self.write_node(*item, Context::SequenceItem { col })?;
        }
        Ok(())
    }

    fn write_block_scalar(&mut self, value: &str, col: usize) -> Result<(), EmitError> {
        let body = value.trim_end_matches('\n');
        let trailing = value.len() - body.len();
        let chomp = match trailing {
            0 => "-",
            1 => "",
            _ => "+",
        };
        let indentation = if body
            .split('\n')
            .find(|line| !line.is_empty())
            .is_some_and(|line| line.starts_with(' '))
        {
            self.indent.to_string()
        } else {
            String::new()
        };
        writeln!(self.out, "|{indentation}{chomp}")?;
        for line in body.split('\n') {
            if !line.is_empty() {
                self.pad(col);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
        for _ in 1..trailing {
            self.out.push('\n');
        }
        Ok(())
    }

    fn key_text(&mut self, id: NodeId) -> Result<String, EmitError> {
        let node = self.lookup(id)?;
        match self.props(id, node) {
            // `*name:` would be read as part of the alias name by some parsers.
            Props::Alias(alias) => Ok(format!("{alias} ")),
            Props::Prefix(prefix) => Ok(format!("{prefix}{}", self.inline_text(id, node, false)?)),
        }
    }

    fn flow_text(&mut self, id: NodeId) -> Result<String, EmitError> {
        let node = self.lookup(id)?;
        match self.props(id, node) {
            Props::Alias(alias) => Ok(alias),
            Props::Prefix(prefix) => Ok(format!("{prefix}{}", self.inline_text(id, node, true)?)),
        }
    }

    /// Single-line rendering of a node, switching collections to flow style.
    fn inline_text(&mut self, id: NodeId, node: &Node, in_flow: bool) -> Result<String, EmitError> {
        match node {
            Node::Document { .. } => Err(EmitError::NestedDocument { node: id }),
            Node::Mapping { content, .. } => {
                if content.len() % 2 != 0 {
                    return Err(EmitError::UnpairedMapping { node: id });
                }
                let mut entries = Vec::with_capacity(content.len() / 2);
                for pair in content.chunks_exact(2) {
                    let key = self.flow_text(pair[0])?;
                    let value = self.flow_text(pair[1])?;
                    entries.push(format!("{key}: {value}"));
                }
                Ok(format!("{{{}}}", entries.join(", ")))
            }
            Node::Sequence { content, .. } => {
                let mut items = Vec::with_capacity(content.len());
                for item in content {
                    items.push(self.flow_text(*item)?);
                }
                Ok(format!("[{}]", items.join(", ")))
            }
            Node::Scalar { value, style, .. } => Ok(scalar_text(value, *style, in_flow)),
        }
    }
}

/// A document whose root writes nothing: no content, or an untagged and
/// unanchored empty plain scalar.
fn is_empty_document(tree: &Tree, id: NodeId) -> bool {
    let Some(Node::Document { content }) = tree.get(id) else {
        return false;
    };
    content.iter().all(|root| {
        tree.anchor(*root).is_none()
            && matches!(
                tree.get(*root),
                Some(Node::Scalar { value, style: ScalarStyle::Plain, tag: None })
                    if value.is_empty()
            )
    })
}

fn scalar_text(value: &str, style: ScalarStyle, in_flow: bool) -> String {
    match style {
        ScalarStyle::Plain if value.is_empty() => "null".to_string(),
        ScalarStyle::Plain if plain_allowed(value, in_flow) => value.to_string(),
        ScalarStyle::Any
            if plain_allowed(value, in_flow)
                && resolve_plain(value) == "!!str"
                && !is_yaml11_bool(value) =>
        {
            value.to_string()
        }
        ScalarStyle::SingleQuoted if !value.chars().any(char::is_control) => {
            format!("'{}'", value.replace('\'', "''"))
        }
        _ => double_quoted(value),
    }
}

fn plain_allowed(value: &str, in_flow: bool) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if matches!(
        first,
        '[' | ']' | '{' | '}' | ',' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`'
    ) {
        return false;
    }
    if matches!(first, '-' | '?' | ':') && chars.next().is_none_or(char::is_whitespace) {
        return false;
    }
    if value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.ends_with(':')
        || value.contains(": ")
        || value.contains(" #")
        || value.starts_with("---")
        || value.starts_with("...")
        || value.chars().any(char::is_control)
    {
        return false;
    }
    !(in_flow && value.contains([',', '[', ']', '{', '}']))
}

fn is_yaml11_bool(value: &str) -> bool {
    matches!(
        value,
        "y" | "Y"
            | "yes"
            | "Yes"
            | "YES"
            | "n"
            | "N"
            | "no"
            | "No"
            | "NO"
            | "on"
            | "On"
            | "ON"
            | "off"
            | "Off"
            | "OFF"
    )
}

fn fits_block_scalar(value: &str) -> bool {
    !value.trim_end_matches('\n').is_empty()
        && !value
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t')
}

fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::{Emitter, double_quoted, plain_allowed, scalar_text};
    use crate::load_from_str;
    use crate::tree::{Node, ScalarStyle, Tree};

    #[test]
    fn plain_strings_that_look_like_other_types_are_quoted() {
        assert_eq!(scalar_text("selector", ScalarStyle::Any, false), "selector");
        assert_eq!(scalar_text("true", ScalarStyle::Any, false), "\"true\"");
        assert_eq!(scalar_text("8080", ScalarStyle::Any, false), "\"8080\"");
        assert_eq!(scalar_text("yes", ScalarStyle::Any, false), "\"yes\"");
        assert_eq!(scalar_text("", ScalarStyle::Any, false), "\"\"");
        // source plain scalars keep their type
        assert_eq!(scalar_text("8080", ScalarStyle::Plain, false), "8080");
    }

    #[test]
    fn structural_characters_force_quoting() {
        assert!(plain_allowed("nginx:1.25", false));
        assert!(plain_allowed("-c", false));
        assert!(plain_allowed("a,b", false));
        assert!(!plain_allowed("a,b", true));
        assert!(!plain_allowed("key: value", false));
        assert!(!plain_allowed("value #comment", false));
        assert!(!plain_allowed("- item", false));
        assert!(!plain_allowed("*alias", false));
        assert!(!plain_allowed(" padded", false));
        assert!(!plain_allowed("two\nlines", false));
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(double_quoted("say \"hi\"\n"), r#""say \"hi\"\n""#);
        assert_eq!(double_quoted("bell\u{7}"), r#""bell\u0007""#);
        assert_eq!(
            scalar_text("it's", ScalarStyle::SingleQuoted, false),
            "'it''s'"
        );
        assert_eq!(
            scalar_text("a\nb", ScalarStyle::SingleQuoted, false),
            r#""a\nb""#
        );
    }

    #[test]
    fn stripped_block_keeps_whitespace_only_last_line() -> color_eyre::eyre::Result<()> {
        let mut tree = Tree::new();
        let key = tree.string("script");
        let value = tree.push(Node::Scalar {
            value: "x\n ".to_string(),
            style: ScalarStyle::Literal,
            tag: None,
        });
        let root = tree.mapping(vec![key, value]);
        let doc = tree.push(Node::Document {
            content: vec![root],
        });

        let out = Emitter::new().emit_document(&tree, doc)?;
        assert_eq!(out, "script: |-\n  x\n   \n");

        let stream = load_from_str(&out)?;
        let (script, _) = stream
            .tree
            .find_field(stream.documents[0], "script")
            .ok_or_else(|| color_eyre::eyre::eyre!("script not found"))?;
        assert_eq!(stream.tree.scalar_value(script), Some("x\n "));
        Ok(())
    }
}
