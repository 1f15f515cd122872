//! Multi-document YAML stream decoding and Application classification.
//!
//! `helm template` output is a `---` separated stream of arbitrary resources.
//! [`DocumentStream`] decodes it one document at a time and
//! [`Classified`] keeps only the documents of the expected
//! `apiVersion`/`kind`.
//!
//! Documents are built from parser events rather than a typed YAML value, so
//! scalars keep the exact text they were written with (`1.10` stays `1.10`)
//! and repeated mapping keys are kept as they appear.

use std::collections::HashMap;
use std::io::Read;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, ScanError, TScalarStyle};

use crate::domain::{Result, RoarError};
use crate::node::Node;

/// Expected `apiVersion`/`kind` pair of application documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationKind {
    pub api_version: String,
    pub kind: String,
}

impl ApplicationKind {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// The Argo CD `argoproj.io/v1alpha1` `Application` kind.
    pub fn argo_application() -> Self {
        Self::new("argoproj.io/v1alpha1", "Application")
    }

    /// Whether both `apiVersion` and `kind` resolve to the expected values.
    pub fn matches(&self, node: &Node) -> bool {
        let (api_version, api_found) = node.resolve("apiVersion");
        let (kind, kind_found) = node.resolve("kind");
        api_found && kind_found && api_version == self.api_version && kind == self.kind
    }
}

impl Default for ApplicationKind {
    fn default() -> Self {
        Self::argo_application()
    }
}

/// One decoded unit of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Zero-based position in the stream.
    pub index: usize,
    pub node: Node,
}

impl Document {
    pub fn new(index: usize, node: Node) -> Self {
        Self { index, node }
    }

    /// `metadata.name`, when present.
    pub fn name(&self) -> Option<String> {
        match self.node.resolve("metadata.name") {
            (name, true) => Some(name),
            _ => None,
        }
    }
}

/// Characters of an owned string, for feeding the parser.
struct OwnedChars {
    text: String,
    pos: usize,
}

impl Iterator for OwnedChars {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

/// Lazily decodes documents from a YAML stream.
///
/// Yields `Err(MalformedDocument)` for the first document that fails to parse
/// and then stops; nothing after a broken document is trusted.
pub struct DocumentStream {
    parser: Parser<OwnedChars>,
    /// Error reading the input, reported as the first item.
    pending: Option<RoarError>,
    index: usize,
    done: bool,
}

impl DocumentStream {
    /// Read `reader` to the end and decode its documents one by one.
    ///
    /// Read failures and non UTF-8 input surface as the first item.
    pub fn from_reader<R: Read>(mut reader: R) -> Self {
        let mut text = String::new();
        let pending = reader.read_to_string(&mut text).err().map(|err| {
            if err.kind() == std::io::ErrorKind::InvalidData {
                RoarError::MalformedDocument {
                    index: 0,
                    location: None,
                    message: format!("stream is not valid UTF-8: {err}"),
                }
            } else {
                RoarError::Io(err)
            }
        });
        if pending.is_some() {
            text.clear();
        }
        Self {
            parser: Parser::new(OwnedChars { text, pos: 0 }),
            pending,
            index: 0,
            done: false,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::from_reader(bytes)
    }

    /// Keep only documents of the given kind.
    pub fn classified(self, kind: ApplicationKind) -> Classified {
        Classified { stream: self, kind }
    }
}

impl Iterator for DocumentStream {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }

        let mut builder = TreeBuilder::default();
        if let Err(err) = self.parser.load(&mut builder, false) {
            self.done = true;
            return Some(Err(malformed(self.index, &err)));
        }
        let Some(root) = builder.root else {
            self.done = true;
            return None;
        };

        let index = self.index;
        self.index += 1;
        Some(Ok(Document::new(index, root)))
    }
}

pub(crate) fn malformed(index: usize, err: &ScanError) -> RoarError {
    let marker = err.marker();
    RoarError::MalformedDocument {
        index,
        location: Some(format!("{}:{}", marker.line(), marker.col() + 1)),
        message: err.info().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Event to tree
// ---------------------------------------------------------------------------

enum Frame {
    Sequence {
        anchor: usize,
        items: Vec<Node>,
    },
    Mapping {
        anchor: usize,
        entries: Vec<(String, Node)>,
        key: Option<String>,
    },
}

/// Builds the [`Node`] of one document from parser events.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Node>,
    root: Option<Node>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { entries, key, .. }) => match key.take() {
                None => *key = Some(node.text().to_string()),
                Some(k) => entries.push((k, node)),
            },
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, _mark: Marker) {
        match event {
            Event::Scalar(value, style, anchor, tag) => {
                let node = if style == TScalarStyle::Plain && tag.is_none() && is_null(&value) {
                    Node::Null
                } else {
                    Node::Scalar(value)
                };
                self.push(node, anchor);
            }
            Event::Alias(anchor) => {
                let node = self.anchors.get(&anchor).cloned().unwrap_or(Node::Null);
                self.push(node, 0);
            }
            Event::SequenceStart(anchor, _) => self.stack.push(Frame::Sequence {
                anchor,
                items: Vec::new(),
            }),
            Event::MappingStart(anchor, _) => self.stack.push(Frame::Mapping {
                anchor,
                entries: Vec::new(),
                key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => match self.stack.pop() {
                Some(Frame::Sequence { anchor, items }) => self.push(Node::Sequence(items), anchor),
                Some(Frame::Mapping {
                    anchor, entries, ..
                }) => self.push(Node::Mapping(entries), anchor),
                None => {}
            },
            _ => {}
        }
    }
}

/// Plain scalars YAML reads as null.
fn is_null(value: &str) -> bool {
    matches!(value, "" | "~" | "null" | "Null" | "NULL")
}

/// Documents of one [`ApplicationKind`]; decode errors pass through.
pub struct Classified {
    stream: DocumentStream,
    kind: ApplicationKind,
}

impl Iterator for Classified {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stream.next()? {
                Ok(doc) if self.kind.matches(&doc.node) => return Some(Ok(doc)),
                Ok(doc) => {
                    tracing::trace!(document = doc.index, "Ignoring non-application document");
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
