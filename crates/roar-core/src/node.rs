//! Generic YAML node tree and dot-path lookup.
//!
//! Documents in the rendered app-of-apps stream have no fixed schema, so
//! classification and filtering run against this small tagged union instead
//! of typed structs. Scalars keep their textual form, the same text helm
//! wrote out. Trees are built by [`crate::stream::DocumentStream`].

/// A loosely typed YAML node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Key/value pairs in document order. Keys are rendered to text.
    Mapping(Vec<(String, Node)>),
    Sequence(Vec<Node>),
    Scalar(String),
    Null,
}

impl Node {
    /// Child of a mapping node by key. `None` for non-mappings.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Textual value of a leaf. Non-scalar nodes have an empty text.
    pub fn text(&self) -> &str {
        match self {
            Node::Scalar(s) => s,
            Node::Mapping(_) | Node::Sequence(_) | Node::Null => "",
        }
    }

    /// Resolve a dot-separated `path` and return `(value, found)`.
    ///
    /// Every segment must name a key of a mapping; anything else (a missing
    /// key, a scalar or sequence in the middle of the path) yields
    /// `("", false)`. A path that lands on a mapping, sequence or null node is
    /// found with an empty value.
    pub fn resolve(&self, path: &str) -> (String, bool) {
        let mut current = self;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return (String::new(), false),
            }
        }
        (current.text().to_string(), true)
    }
}

/// [`Node::resolve`] for an optional root; a missing root never resolves.
pub fn resolve(node: Option<&Node>, path: &str) -> (String, bool) {
    match node {
        Some(node) => node.resolve(path),
        None => (String::new(), false),
    }
}
