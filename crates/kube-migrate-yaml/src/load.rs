use std::collections::HashMap;

use yaml_rust::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust::scanner::{Marker, ScanError, Scanner, TScalarStyle, Token, TokenType};

use crate::tree::{CollectionStyle, Node, NodeId, ScalarStyle, Stream, Tree};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("alias at line {line} column {column} does not refer to a completed anchor")]
    UnknownAnchor { line: usize, column: usize },

    #[error("unbalanced event stream at line {line} column {column}")]
    Unbalanced { line: usize, column: usize },
}

impl LoadError {
    fn at(mark: Marker, make: impl FnOnce(usize, usize) -> Self) -> Self {
        make(mark.line(), mark.col() + 1)
    }
}

/// Parse every document of `source` into one arena.
///
/// # Errors
///
/// Returns a [`LoadError`] if `source` is not well-formed YAML.
pub fn load_from_str(source: &str) -> Result<Stream, LoadError> {
    let chars: Vec<char> = source.chars().collect();

    // The event parser only reports numeric anchor ids. Anchors are numbered in
    // the order they occur, so a token pass recovers their names.
    let anchor_names: Vec<String> = Scanner::new(source.chars())
        .filter_map(|Token(_, token)| match token {
            TokenType::Anchor(name) => Some(name),
            _ => None,
        })
        .collect();

    let mut builder = TreeBuilder::new(&chars, anchor_names);
    let mut parser = Parser::new(source.chars());
    parser.load(&mut builder, true)?;
    builder.finish()
}

#[derive(Debug)]
enum FrameKind {
    Document,
    Mapping(CollectionStyle),
    Sequence(CollectionStyle),
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    anchor: Option<(usize, String)>,
    content: Vec<NodeId>,
}

struct TreeBuilder<'src> {
    source: &'src [char],
    anchor_names: std::vec::IntoIter<String>,
    tree: Tree,
    documents: Vec<NodeId>,
    frames: Vec<Frame>,
    anchors: HashMap<usize, NodeId>,
    error: Option<LoadError>,
}

impl<'src> TreeBuilder<'src> {
    fn new(source: &'src [char], anchor_names: Vec<String>) -> Self {
        Self {
            source,
            anchor_names: anchor_names.into_iter(),
            tree: Tree::new(),
            documents: Vec::new(),
            frames: Vec::new(),
            anchors: HashMap::new(),
            error: None,
        }
    }

    fn finish(self) -> Result<Stream, LoadError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Stream {
            tree: self.tree,
            documents: self.documents,
        })
    }

    fn char_at(&self, mark: Marker) -> Option<char> {
        self.source.get(mark.index()).copied()
    }

    fn collection_style(&self, mark: Marker, flow_open: char) -> CollectionStyle {
        if self.char_at(mark) == Some(flow_open) {
            CollectionStyle::Flow
        } else {
            CollectionStyle::Block
        }
    }

    fn anchor(&mut self, anchor_id: usize) -> Option<(usize, String)> {
        if anchor_id == 0 {
            return None;
        }
        self.anchor_names.next().map(|name| (anchor_id, name))
    }

    fn attach(&mut self, id: NodeId, mark: Marker) {
        match self.frames.last_mut() {
            Some(frame) => frame.content.push(id),
            None => self.fail(LoadError::at(mark, |line, column| {
                LoadError::Unbalanced { line, column }
            })),
        }
    }

    fn complete(&mut self, node: Node, anchor: Option<(usize, String)>, mark: Marker) {
        let (anchor_id, name) = anchor.unzip();
        let id = self.tree.push_anchored(node, name);
        if let Some(anchor_id) = anchor_id {
            self.anchors.insert(anchor_id, id);
        }
        self.attach(id, mark);
    }

    fn open(&mut self, kind: FrameKind, anchor_id: usize) {
        let anchor = self.anchor(anchor_id);
        self.frames.push(Frame {
            kind,
            anchor,
            content: Vec::new(),
        });
    }

    fn close(&mut self, mark: Marker) {
        let Some(frame) = self.frames.pop() else {
            self.fail(LoadError::at(mark, |line, column| LoadError::Unbalanced {
                line,
                column,
            }));
            return;
        };
        let node = match frame.kind {
            FrameKind::Document => {
                let id = self.tree.push(Node::Document {
                    content: frame.content,
                });
                self.documents.push(id);
                return;
            }
            FrameKind::Mapping(style) => Node::Mapping {
                content: frame.content,
                style,
            },
            FrameKind::Sequence(style) => Node::Sequence {
                content: frame.content,
                style,
            },
        };
        self.complete(node, frame.anchor, mark);
    }

    fn scalar(
        &mut self,
        value: String,
        style: TScalarStyle,
        anchor_id: usize,
        tag: Option<TokenType>,
        mark: Marker,
    ) {
        let style = match style {
            TScalarStyle::Any => ScalarStyle::Any,
            TScalarStyle::Plain => ScalarStyle::Plain,
            TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
            TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            TScalarStyle::Literal => ScalarStyle::Literal,
            TScalarStyle::Foled => ScalarStyle::Folded,
        };
        // The parser stands in `~` for values that are absent from the source.
        let value = if style == ScalarStyle::Plain && value == "~" && self.char_at(mark) != Some('~')
        {
            String::new()
        } else {
            value
        };
        let tag = match tag {
            Some(TokenType::Tag(handle, suffix)) => Some(render_tag(&handle, &suffix)),
            _ => None,
        };
        let anchor = self.anchor(anchor_id);
        self.complete(Node::Scalar { value, style, tag }, anchor, mark);
    }

    fn fail(&mut self, err: LoadError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl MarkedEventReceiver for TreeBuilder<'_> {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        match event {
            Event::Nothing | Event::StreamStart | Event::StreamEnd => {}
            Event::DocumentStart => {
                self.anchors.clear();
                self.open(FrameKind::Document, 0);
            }
            Event::DocumentEnd | Event::MappingEnd | Event::SequenceEnd => self.close(mark),
            Event::MappingStart(anchor_id) => {
                let style = self.collection_style(mark, '{');
                self.open(FrameKind::Mapping(style), anchor_id);
            }
            Event::SequenceStart(anchor_id) => {
                let style = self.collection_style(mark, '[');
                self.open(FrameKind::Sequence(style), anchor_id);
            }
            Event::Scalar(value, style, anchor_id, tag) => {
                self.scalar(value, style, anchor_id, tag, mark);
            }
            Event::Alias(anchor_id) => match self.anchors.get(&anchor_id).copied() {
                Some(id) => self.attach(id, mark),
                None => self.fail(LoadError::at(mark, |line, column| {
                    LoadError::UnknownAnchor { line, column }
                })),
            },
        }
    }
}

fn render_tag(handle: &str, suffix: &str) -> String {
    match (handle, suffix) {
        ("", "!") => "!".to_string(),
        ("", verbatim) => format!("!<{verbatim}>"),
        (handle, suffix) => format!("{handle}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::render_tag;

    #[test]
    fn renders_tag_shorthands() {
        assert_eq!(render_tag("!!", "str"), "!!str");
        assert_eq!(render_tag("!", "Ref"), "!Ref");
        assert_eq!(render_tag("", "!"), "!");
        assert_eq!(
            render_tag("", "tag:yaml.org,2002:int"),
            "!<tag:yaml.org,2002:int>"
        );
    }
}
