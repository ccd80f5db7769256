use std::fmt;

/// Handle of a node inside a [`Tree`].
///
/// Handles are plain indices. The same handle may appear in several content
/// lists, in which case every position refers to one shared node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CollectionStyle {
    #[default]
    Block,
    Flow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScalarStyle {
    /// Let the emitter decide.
    #[default]
    Any,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Document,
    Mapping,
    Sequence,
    Scalar,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Document => "document",
            Kind::Mapping => "mapping",
            Kind::Sequence => "sequence",
            Kind::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Document {
        content: Vec<NodeId>,
    },
    /// Keys sit at even and values at odd positions of `content`.
    Mapping {
        content: Vec<NodeId>,
        style: CollectionStyle,
    },
    Sequence {
        content: Vec<NodeId>,
        style: CollectionStyle,
    },
    Scalar {
        value: String,
        style: ScalarStyle,
        /// Tag written in the source, e.g. `!!str`.
        tag: Option<String>,
    },
}

impl Node {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Node::Document { .. } => Kind::Document,
            Node::Mapping { .. } => Kind::Mapping,
            Node::Sequence { .. } => Kind::Sequence,
            Node::Scalar { .. } => Kind::Scalar,
        }
    }

    #[must_use]
    pub fn content(&self) -> &[NodeId] {
        match self {
            Node::Document { content }
            | Node::Mapping { content, .. }
            | Node::Sequence { content, .. } => content,
            Node::Scalar { .. } => &[],
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Node::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    anchor: Option<String>,
}

/// Arena owning every node of one parsed input.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    slots: Vec<Slot>,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        self.push_anchored(node, None)
    }

    pub fn push_anchored(&mut self, node: Node, anchor: Option<String>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot { node, anchor });
        id
    }

    /// Build a `!!str` scalar that the emitter is free to quote.
    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        self.push(Node::Scalar {
            value: value.into(),
            style: ScalarStyle::Any,
            tag: None,
        })
    }

    /// Build a block mapping from alternating key and value handles.
    pub fn mapping(&mut self, content: Vec<NodeId>) -> NodeId {
        self.push(Node::Mapping {
            content,
            style: CollectionStyle::Block,
        })
    }

    /// # Panics
    ///
    /// Panics if `id` was not handed out by this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.slots[id.0].node
    }

    /// # Panics
    ///
    /// Panics if `id` was not handed out by this tree.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.slots[id.0].node
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).map(|slot| &slot.node)
    }

    #[must_use]
    pub fn anchor(&self, id: NodeId) -> Option<&str> {
        self.slots.get(id.0).and_then(|slot| slot.anchor.as_deref())
    }

    #[must_use]
    pub fn scalar_value(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(Node::value)
    }

    /// Replace the payload of a scalar node, keeping its style and tag.
    ///
    /// Returns `false` if `id` is not a scalar.
    pub fn set_scalar_value(&mut self, id: NodeId, new_value: impl Into<String>) -> bool {
        match self.slots.get_mut(id.0).map(|slot| &mut slot.node) {
            Some(Node::Scalar { value, .. }) => {
                *value = new_value.into();
                true
            }
            _ => false,
        }
    }

    /// Mutable child list of a document, mapping or sequence.
    pub fn content_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match self.slots.get_mut(id.0).map(|slot| &mut slot.node) {
            Some(
                Node::Document { content }
                | Node::Mapping { content, .. }
                | Node::Sequence { content, .. },
            ) => Some(content),
            _ => None,
        }
    }

    /// Look up `key` among the direct entries of a mapping.
    ///
    /// Documents are searched child by child and the first hit wins. Any
    /// other node kind never matches. On success the value handle is returned
    /// together with its position in the mapping's content, so the key sits at
    /// `index - 1`.
    #[must_use]
    pub fn find_field(&self, node: NodeId, key: &str) -> Option<(NodeId, usize)> {
        match self.get(node)? {
            Node::Document { content } => content
                .iter()
                .find_map(|child| self.find_field(*child, key)),
            Node::Mapping { content, .. } => {
                content
                    .chunks_exact(2)
                    .enumerate()
                    .find_map(|(pair, entry)| {
                        (self.scalar_value(entry[0]) == Some(key))
                            .then_some((entry[1], pair * 2 + 1))
                    })
            }
            Node::Sequence { .. } | Node::Scalar { .. } => None,
        }
    }

    /// Resolved tag in its short form.
    ///
    /// Untagged plain scalars resolve through the YAML core schema; quoted and
    /// block scalars are always strings.
    #[must_use]
    pub fn short_tag(&self, id: NodeId) -> String {
        match self.get(id) {
            None | Some(Node::Document { .. }) => String::new(),
            Some(Node::Mapping { .. }) => "!!map".to_string(),
            Some(Node::Sequence { .. }) => "!!seq".to_string(),
            Some(Node::Scalar {
                value, style, tag, ..
            }) => match tag {
                Some(tag) => shorten_tag(tag),
                None if matches!(style, ScalarStyle::Plain) => resolve_plain(value).to_string(),
                None => "!!str".to_string(),
            },
        }
    }

    /// One line per node, indented by depth: `<kind> <tag> <value>`.
    #[must_use]
    pub fn outline(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.outline_into(id, 0, &mut out);
        out
    }

    fn outline_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        let line = format!(
            "{:indent$}{} {} {}",
            "",
            node.kind(),
            self.short_tag(id),
            node.value().unwrap_or_default(),
            indent = depth * 2,
        );
        out.push_str(line.trim_end());
        out.push('\n');
        for child in node.content() {
            self.outline_into(*child, depth + 1, out);
        }
    }
}

impl std::ops::Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.node(id)
    }
}

/// Every document parsed from one input, sharing a single arena.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub tree: Tree,
    pub documents: Vec<NodeId>,
}

impl Stream {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn shorten_tag(tag: &str) -> String {
    const CORE_PREFIX: &str = "!<tag:yaml.org,2002:";
    match tag
        .strip_prefix(CORE_PREFIX)
        .and_then(|rest| rest.strip_suffix('>'))
    {
        Some(name) => format!("!!{name}"),
        None => tag.to_string(),
    }
}

pub(crate) fn resolve_plain(value: &str) -> &'static str {
    match value {
        "" | "~" | "null" | "Null" | "NULL" => "!!null",
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => "!!bool",
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" | "-.inf" | "-.Inf" | "-.INF"
        | ".nan" | ".NaN" | ".NAN" => "!!float",
        _ if is_int(value) => "!!int",
        _ if is_float(value) => "!!float",
        _ => "!!str",
    }
}

fn is_int(value: &str) -> bool {
    if let Some(octal) = value.strip_prefix("0o") {
        return !octal.is_empty() && octal.chars().all(|c| c.is_digit(8));
    }
    if let Some(hex) = value.strip_prefix("0x") {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float(value: &str) -> bool {
    let body = value.strip_prefix(['-', '+']).unwrap_or(value);
    body.chars().any(|c| c.is_ascii_digit())
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && !body.starts_with(['e', 'E'])
        && value.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::resolve_plain;

    #[test]
    fn resolves_core_schema_scalars() {
        assert_eq!(resolve_plain("~"), "!!null");
        assert_eq!(resolve_plain(""), "!!null");
        assert_eq!(resolve_plain("True"), "!!bool");
        assert_eq!(resolve_plain("42"), "!!int");
        assert_eq!(resolve_plain("-7"), "!!int");
        assert_eq!(resolve_plain("0x1F"), "!!int");
        assert_eq!(resolve_plain("0o17"), "!!int");
        assert_eq!(resolve_plain("1.5"), "!!float");
        assert_eq!(resolve_plain("6.02e23"), "!!float");
        assert_eq!(resolve_plain(".inf"), "!!float");
        assert_eq!(resolve_plain("apps/v1"), "!!str");
        assert_eq!(resolve_plain("inf"), "!!str");
        assert_eq!(resolve_plain("e5"), "!!str");
        assert_eq!(resolve_plain("1.2.3"), "!!str");
        assert_eq!(resolve_plain("yes"), "!!str");
    }
}
