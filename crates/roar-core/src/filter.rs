//! Dot-path filters over raw application documents.
//!
//! A filter is written `path OP value`, e.g.
//! `spec.source.targetRevision!=master`. Filters are parsed once at startup
//! and evaluated against every classified document before it is decoded.
//!
//! Missing fields never compare equal to anything, so `==` requires the path
//! to exist while `!=` is satisfied by its absence.

use serde::{Deserialize, Serialize};

use crate::domain::{Result, RoarError};
use crate::node::{self, Node};

/// Comparison operator of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parser options for filter strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept a lone `=` as `==`.
    pub lenient: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self { lenient: false }
    }

    pub fn lenient() -> Self {
        Self { lenient: true }
    }
}

/// A single `path OP value` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub path: String,
    pub operator: Operator,
    pub value: String,
}

impl Predicate {
    /// Parse a filter string such as `metadata.name==api`.
    ///
    /// Operators are tried in order `!=`, `==`, then (lenient only) `=`. The
    /// string is split on the first occurrence of the operator and both sides
    /// are trimmed. An empty value is allowed.
    pub fn parse(input: &str, options: ParseOptions) -> Result<Self> {
        let (operator, token) = if input.contains("!=") {
            (Operator::NotEquals, "!=")
        } else if input.contains("==") {
            (Operator::Equals, "==")
        } else if options.lenient && input.contains('=') {
            (Operator::Equals, "=")
        } else {
            return Err(invalid(
                input,
                "operator not found (supported: ==, !=)".to_string(),
            ));
        };

        let Some((path, value)) = input.split_once(token) else {
            return Err(invalid(input, format!("expected 'key{token}value'")));
        };

        let path = path.trim();
        if path.is_empty() {
            return Err(invalid(input, format!("empty path before '{token}'")));
        }

        Ok(Self {
            path: path.to_string(),
            operator,
            value: value.trim().to_string(),
        })
    }

    /// Evaluate against a document. A missing document never matches.
    pub fn matches(&self, node: Option<&Node>) -> bool {
        let Some(node) = node else {
            return false;
        };
        let (actual, found) = node.resolve(&self.path);
        match self.operator {
            Operator::Equals => found && actual == self.value,
            Operator::NotEquals => !found || actual != self.value,
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} '{}'", self.path, self.operator, self.value)
    }
}

fn invalid(input: &str, reason: String) -> RoarError {
    RoarError::InvalidPredicate {
        input: input.to_string(),
        reason,
    }
}

/// A conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    predicates: Vec<Predicate>,
}

impl Filters {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Parse every non-empty filter string. The first invalid one aborts.
    pub fn parse<S: AsRef<str>>(raw: &[S], options: ParseOptions) -> Result<Self> {
        let predicates = raw
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.is_empty())
            .map(|s| Predicate::parse(s, options))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { predicates })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.predicates.iter()
    }

    /// The first predicate the document fails, if any.
    pub fn first_failure(&self, node: Option<&Node>) -> Option<&Predicate> {
        self.predicates.iter().find(|p| !p.matches(node))
    }

    /// Whether every predicate matches. An empty set matches everything.
    pub fn matches(&self, node: Option<&Node>) -> bool {
        self.first_failure(node).is_none()
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.predicates.iter()
    }
}

/// Value found at a predicate's path, for diagnostics.
pub fn observed(node: Option<&Node>, predicate: &Predicate) -> (String, bool) {
    node::resolve(node, &predicate.path)
}
