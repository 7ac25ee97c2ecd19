//! One-hop structural signatures of blank nodes.
//!
//! A signature lists the node's class edges, incoming edges and outgoing
//! non-type edges. Anchors (named resources and literals) are embedded
//! verbatim; blank neighbours are replaced by their rank in a per-node table
//! sorted by folded edge labels, which removes the arbitrary blank identifier
//! and makes signatures from two unrelated identifier spaces comparable as text.

use crate::error::{AlignError, Result};
use crate::graph::Graph;
use crate::node::{Node, NodeId, PredicateId, Triple, RDF_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const OUT_MARK: char = '▲';
const IN_MARK: char = '▼';
const BLANK_MARK: char = '⏺';
/// Joins labels of parallel edges towards the same blank neighbour.
const FOLD_MARK: char = '∗';
const ENTRY_MARK: char = '•';
const CATEGORY_END: char = '◇';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct EdgeLabel {
    label: String,
    /// Opposite endpoint when it is blank; anchors are already inside `label`.
    blank: Option<NodeId>,
}

fn edge_label(graph: &Graph, predicate: PredicateId, mark: char, opposite: NodeId) -> EdgeLabel {
    let mut label = String::from(graph.predicate_iri(predicate));
    label.push(mark);
    match graph.node(opposite) {
        Some(Node::Blank(_)) => {
            label.push(BLANK_MARK);
            return EdgeLabel {
                label,
                blank: Some(opposite),
            };
        }
        Some(Node::Literal(value)) => {
            label.push('"');
            label.push_str(value);
            label.push('"');
        }
        Some(Node::Named(iri)) => label.push_str(iri),
        None => {}
    }
    EdgeLabel { label, blank: None }
}

/// Folded labels of every edge joining `node` and `other`, seen from `node`.
///
/// Two blank-blank edges play the same role in their graphs exactly when
/// their endpoints' connection labels agree. A self-loop is described by
/// `connection_label(graph, node, node)`.
pub fn connection_label(graph: &Graph, node: NodeId, other: NodeId) -> String {
    let outgoing = graph
        .find(Some(node), None, Some(other))
        .into_iter()
        .map(|t| (t.predicate, OUT_MARK));
    let incoming = graph
        .find(Some(other), None, Some(node))
        .into_iter()
        .map(|t| (t.predicate, IN_MARK));
    let mut labels: Vec<String> = outgoing
        .chain(incoming)
        .map(|(p, mark)| {
            let mut label = String::from(graph.predicate_iri(p));
            label.push(mark);
            label
        })
        .collect();
    labels.sort();
    labels.join(&FOLD_MARK.to_string())
}

/// Class, incoming and outgoing non-type edges, each sorted by label.
fn edge_categories(graph: &Graph, node: NodeId) -> [Vec<EdgeLabel>; 3] {
    let rdf_type = graph.predicate(RDF_TYPE);
    let out = |t: &Triple| edge_label(graph, t.predicate, OUT_MARK, t.object);

    let mut class: Vec<EdgeLabel> = match rdf_type {
        Some(p) => graph.find(Some(node), Some(p), None).iter().map(out).collect(),
        None => Vec::new(),
    };
    let mut incoming: Vec<EdgeLabel> = graph
        .find(None, None, Some(node))
        .iter()
        .map(|t| edge_label(graph, t.predicate, IN_MARK, t.subject))
        .collect();
    let mut outgoing: Vec<EdgeLabel> = graph
        .find(Some(node), None, None)
        .iter()
        .filter(|t| Some(t.predicate) != rdf_type)
        .map(out)
        .collect();

    for category in [&mut class, &mut incoming, &mut outgoing] {
        category.sort_by(|a, b| a.label.cmp(&b.label));
    }
    [class, incoming, outgoing]
}

/// Ranks every blank neighbour by its folded label.
///
/// Parallel edges to the same neighbour are folded into one compound label
/// within each category, every category closes all labels with the category
/// marker, and the resulting table is sorted by label.
fn rank_table(categories: &[Vec<EdgeLabel>; 3]) -> HashMap<NodeId, usize> {
    let mut folded: Vec<(String, NodeId)> = Vec::new();
    for category in categories {
        let mut next = folded.clone();
        let mut position: HashMap<NodeId, usize> =
            next.iter().enumerate().map(|(i, (_, n))| (*n, i)).collect();
        for edge in category {
            let Some(neighbour) = edge.blank else { continue };
            match position.get(&neighbour) {
                Some(&i) => {
                    next[i].0.push(FOLD_MARK);
                    next[i].0.push_str(&edge.label);
                }
                None => {
                    position.insert(neighbour, next.len());
                    next.push((edge.label.clone(), neighbour));
                }
            }
        }
        folded = next
            .into_iter()
            .map(|(mut label, n)| {
                label.push(CATEGORY_END);
                (label, n)
            })
            .collect();
    }
    folded.sort_by(|a, b| a.0.cmp(&b.0));
    folded
        .into_iter()
        .enumerate()
        .map(|(rank, (_, n))| (n, rank))
        .collect()
}

/// Computes the signature of `node` in `graph`.
///
/// Two blank nodes with identical one-hop edge multisets against anchors and
/// coinciding blank-neighbour ranks get identical signatures, whatever their
/// identifiers.
pub fn compute_signature(graph: &Graph, node: NodeId) -> Result<Signature> {
    let categories = edge_categories(graph, node);
    let ranks = rank_table(&categories);

    let mut signature = String::new();
    for category in &categories {
        let mut entries = category
            .iter()
            .map(|edge| match edge.blank {
                None => Ok((edge.label.as_str(), None)),
                Some(n) => ranks
                    .get(&n)
                    .map(|&rank| (edge.label.as_str(), Some(rank)))
                    .ok_or_else(|| AlignError::MissingRank {
                        node: graph.lexical(node).to_string(),
                        neighbour: graph.lexical(n).to_string(),
                    }),
            })
            .collect::<Result<Vec<_>>>()?;
        // Equal labels towards symmetric neighbours must not depend on triple order.
        entries.sort();
        for (label, rank) in entries {
            signature.push_str(label);
            if let Some(rank) = rank {
                signature.push_str(&rank.to_string());
            }
            signature.push(ENTRY_MARK);
        }
        signature.push(CATEGORY_END);
    }
    Ok(Signature(signature))
}

/// Signatures of every blank node of one graph, indexed by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    signatures: Vec<Option<Signature>>,
}

impl SignatureTable {
    pub fn compute(graph: &Graph) -> Result<Self> {
        let mut signatures = vec![None; graph.node_count()];
        for node in graph.blank_nodes() {
            signatures[node.index()] = Some(compute_signature(graph, node)?);
        }
        Ok(Self { signatures })
    }

    pub fn get(&self, node: NodeId) -> Option<&Signature> {
        self.signatures.get(node.index()).and_then(Option::as_ref)
    }

    /// Like [`get`](Self::get), but a missing signature is an internal fault.
    pub fn require(&self, graph: &Graph, node: NodeId) -> Result<&Signature> {
        self.get(node)
            .ok_or_else(|| AlignError::MissingSignature(graph.lexical(node).to_string()))
    }

    /// Checks that every blank node of `graph` has a signature here.
    pub fn covers(&self, graph: &Graph) -> Result<()> {
        for node in graph.blank_nodes() {
            self.require(graph, node)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.signatures.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(triples: &[(&str, &str, &str)]) -> Graph {
        let mut g = Graph::new();
        for &(s, p, o) in triples {
            let object = match o.strip_prefix('"') {
                Some(lit) => Node::literal(lit.trim_end_matches('"')),
                None => Node::iri(o),
            };
            g.add_triple(Node::iri(s), p, object).unwrap();
        }
        g
    }

    fn sig(g: &Graph, iri: &str) -> String {
        compute_signature(g, g.lookup_iri(iri).unwrap())
            .unwrap()
            .as_str()
            .to_string()
    }

    #[test]
    fn anchors_are_embedded_verbatim() {
        let g = graph(&[("■0■x", "p", "r1"), ("■0■x", "p", "r2")]);
        assert_eq!(sig(&g, "■0■x"), "◇◇p▲r1•p▲r2•◇");
    }

    #[test]
    fn literals_and_classes_are_separated() {
        let g = graph(&[
            ("■0■x", RDF_TYPE, "Person"),
            ("■0■x", "name", "\"Ann\""),
            ("s", "knows", "■0■x"),
        ]);
        let expected = format!("{RDF_TYPE}▲Person•◇knows▼s•◇name▲\"Ann\"•◇");
        assert_eq!(sig(&g, "■0■x"), expected);
    }

    #[test]
    fn parallel_edges_fold_into_one_rank() {
        let g = graph(&[
            ("■0■b", "p", "■0■c"),
            ("■0■b", "p", "■0■d"),
            ("■0■b", "q", "■0■c"),
        ]);
        assert_eq!(sig(&g, "■0■b"), "◇◇p▲⏺0•p▲⏺1•q▲⏺0•◇");

        let reordered = graph(&[
            ("■0■b", "q", "■0■c"),
            ("■0■b", "p", "■0■d"),
            ("■0■b", "p", "■0■c"),
        ]);
        assert_eq!(sig(&reordered, "■0■b"), sig(&g, "■0■b"));
    }

    #[test]
    fn identifiers_do_not_leak() {
        let a = graph(&[("■0■a", "p", "■0■b"), ("■0■b", "q", "lit")]);
        let b = graph(&[("■1■zz", "p", "■1■k"), ("■1■k", "q", "lit")]);
        assert_eq!(sig(&a, "■0■a"), sig(&b, "■1■zz"));
        assert_eq!(sig(&a, "■0■b"), sig(&b, "■1■k"));
        assert_ne!(sig(&a, "■0■a"), sig(&a, "■0■b"));
    }

    #[test]
    fn self_loop_ranks_the_node_itself() {
        let g = graph(&[("■0■a", "p", "■0■a")]);
        assert_eq!(sig(&g, "■0■a"), "◇p▼⏺0•◇p▲⏺0•◇");
    }

    #[test]
    fn connection_labels_follow_edge_roles() {
        let g = graph(&[
            ("■0■x", "p", "■0■y"),
            ("■0■x", "q", "■0■z"),
            ("■0■z", "p", "■0■x"),
            ("■0■y", "r", "■0■y"),
        ]);
        let id = |iri: &str| g.lookup_iri(iri).unwrap();
        assert_eq!(connection_label(&g, id("■0■x"), id("■0■y")), "p▲");
        assert_eq!(connection_label(&g, id("■0■y"), id("■0■x")), "p▼");
        assert_eq!(connection_label(&g, id("■0■x"), id("■0■z")), "p▼∗q▲");
        assert_eq!(connection_label(&g, id("■0■y"), id("■0■y")), "r▲∗r▼");
        assert_eq!(connection_label(&g, id("■0■x"), id("■0■x")), "");
    }

    #[test]
    fn table_covers_all_blank_nodes() {
        let g = graph(&[("■0■a", "p", "■0■b"), ("n", "p", "■0■a")]);
        let table = SignatureTable::compute(&g).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.covers(&g).is_ok());
        let named = g.lookup_iri("n").unwrap();
        assert!(table.get(named).is_none());
        let err = table.require(&g, named).unwrap_err();
        assert!(err.is_internal_fault());
    }
}
