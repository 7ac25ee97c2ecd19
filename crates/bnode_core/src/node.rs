use serde::{Deserialize, Serialize};
use std::fmt;

/// Every IRI starting with this marker is treated as a blank node.
pub const BNODE_PREFIX: &str = "■";
/// Side marker for blank nodes of the first graph.
pub const BNODE_PREFIX_A: &str = "■0■";
/// Side marker for blank nodes of the second graph.
pub const BNODE_PREFIX_B: &str = "■1■";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Dense index of a node inside one [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: NodeId,
    pub predicate: PredicateId,
    pub object: NodeId,
}

/// A graph term. Blankness is decided by the naming convention, not by the
/// origin of the term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    Named(String),
    Blank(String),
    Literal(String),
}

impl Node {
    /// Classifies an IRI: blank if it follows the blank naming convention, named otherwise.
    pub fn iri(iri: impl Into<String>) -> Self {
        let iri = iri.into();
        if is_blank_iri(&iri) {
            Node::Blank(iri)
        } else {
            Node::Named(iri)
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal(value.into())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Blank(_))
    }

    /// The IRI of a named or blank node, the lexical form of a literal.
    pub fn lexical(&self) -> &str {
        match self {
            Node::Named(s) | Node::Blank(s) | Node::Literal(s) => s,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Named(iri) | Node::Blank(iri) => write!(f, "<{iri}>"),
            Node::Literal(value) => write!(f, "\"{value}\""),
        }
    }
}

pub fn is_blank_iri(iri: &str) -> bool {
    iri.starts_with(BNODE_PREFIX)
}

/// Removes the side marker of a blank IRI (`■0■x` / `■1■x` -> `x`).
pub fn shorten(iri: &str) -> &str {
    iri.strip_prefix(BNODE_PREFIX_A)
        .or_else(|| iri.strip_prefix(BNODE_PREFIX_B))
        .unwrap_or(iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_convention_decides_blankness() {
        assert!(Node::iri("■0■b1").is_blank());
        assert!(!Node::iri("http://example.org/b1").is_blank());
        assert!(!Node::literal("■0■b1").is_blank());
    }

    #[test]
    fn shorten_strips_one_side_marker() {
        assert_eq!(shorten("■0■b7"), "b7");
        assert_eq!(shorten("■1■b7"), "b7");
        assert_eq!(shorten("■b7"), "■b7");
        assert_eq!(shorten("http://example.org/x"), "http://example.org/x");
    }
}
