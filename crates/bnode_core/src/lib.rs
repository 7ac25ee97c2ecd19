//! Blank-node alignment between two versions of a graph.
//!
//! Two snapshots of the same dataset that differ only in how anonymous
//! identifiers were assigned are aligned by structure: every blank node gets a
//! canonical [`Signature`], blank neighbourhoods get a cross-graph comparable
//! ordering, and a radius-bounded co-traversal turns both into a [`Mapping`].
//!
//! ```
//! use bnode_core::{Aligner, Graph, Node, Radius, RSignMatcher, Tier};
//!
//! let mut a = Graph::new();
//! a.add_triple(Node::iri("■0■x"), "http://ex/p", Node::iri("http://ex/r1")).unwrap();
//! a.add_triple(Node::iri("■0■x"), "http://ex/p", Node::iri("http://ex/r2")).unwrap();
//! let mut b = Graph::new();
//! b.add_triple(Node::iri("■1■y"), "http://ex/p", Node::iri("http://ex/r2")).unwrap();
//! b.add_triple(Node::iri("■1■y"), "http://ex/p", Node::iri("http://ex/r1")).unwrap();
//!
//! let report = RSignMatcher::with_radius(Radius::Unbounded).unwrap().align(&a, &b).unwrap();
//! assert_eq!(report.mapping.get("■0■x"), Some("■1■y"));
//! assert_eq!(report.mapping.tier("■0■x"), Some(Tier::ExactComponent));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod interner;
pub mod mapping;
pub mod matcher;
pub mod node;
pub mod order;
pub mod signature;

pub use config::{MatchConfig, Radius};
pub use error::{AlignError, Result};
pub use graph::Graph;
pub use interner::Interner;
pub use mapping::{Mapping, MatchReport, Tier};
pub use matcher::{dissimilarity, Aligner, BaselineMatcher, RSignMatcher};
pub use node::{Node, NodeId, PredicateId, Triple};
pub use order::NeighborOrderer;
pub use signature::{compute_signature, Signature, SignatureTable};
