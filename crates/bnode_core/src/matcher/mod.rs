//! Blank-node matchers and the state they share.

pub mod baseline;
pub mod rsign;

pub use baseline::BaselineMatcher;
pub use rsign::RSignMatcher;

use crate::error::Result;
use crate::graph::Graph;
use crate::mapping::{MatchReport, Mapping, Tier};
use crate::node::NodeId;
use crate::signature::{Signature, SignatureTable};
use bitvec::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// A strategy that aligns the blank nodes of two graphs.
pub trait Aligner {
    /// Maps `blank_a` (nodes of `graph_a`) onto `blank_b` (nodes of `graph_b`).
    /// Entries that are not blank nodes of their graph are ignored.
    fn compute_mapping(
        &self,
        graph_a: &Graph,
        graph_b: &Graph,
        blank_a: &[NodeId],
        blank_b: &[NodeId],
    ) -> Result<MatchReport>;

    /// Aligns every blank node of both graphs.
    fn align(&self, graph_a: &Graph, graph_b: &Graph) -> Result<MatchReport> {
        self.compute_mapping(graph_a, graph_b, &graph_a.blank_nodes(), &graph_b.blank_nodes())
    }
}

const CHAR_WEIGHT: i64 = u16::MAX as i64;

/// Position-sensitive distance between two signatures; lower is closer.
///
/// Equal leading characters (case-insensitive) each earn `CHAR_WEIGHT`; the
/// first mismatch earns `CHAR_WEIGHT` minus the code point distance and ends
/// the scan. The score is subtracted from `CHAR_WEIGHT` times the longer length.
pub fn dissimilarity(a: &str, b: &str) -> i64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let longest = a.len().max(b.len()) as i64;
    let mut score = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        if x == y {
            score += CHAR_WEIGHT;
        } else {
            score += CHAR_WEIGHT - (*x as i64 - *y as i64).abs();
            break;
        }
    }
    CHAR_WEIGHT * longest - score
}

/// Signature tables of both graphs; the two sides are computed in parallel.
pub(crate) fn signature_tables(
    graph_a: &Graph,
    graph_b: &Graph,
) -> Result<(SignatureTable, SignatureTable)> {
    let (a, b) = rayon::join(
        || SignatureTable::compute(graph_a),
        || SignatureTable::compute(graph_b),
    );
    Ok((a?, b?))
}

/// Groups `nodes` by signature, keeping their order.
pub(crate) fn index_by_signature<'t>(
    graph: &Graph,
    signatures: &'t SignatureTable,
    nodes: &[NodeId],
) -> Result<HashMap<&'t Signature, Vec<NodeId>>> {
    let mut index: HashMap<&Signature, Vec<NodeId>> = HashMap::new();
    for &node in nodes {
        index
            .entry(signatures.require(graph, node)?)
            .or_default()
            .push(node);
    }
    Ok(index)
}

fn candidates(graph: &Graph, nodes: &[NodeId]) -> (Vec<NodeId>, BitVec) {
    let mut list: Vec<NodeId> = nodes.iter().copied().filter(|&n| graph.is_blank(n)).collect();
    list.sort();
    list.dedup();
    let mut available = bitvec![0; graph.node_count()];
    for n in &list {
        available.set(n.index(), true);
    }
    (list, available)
}

/// Candidacy bookkeeping of one run. A node stays available until it is
/// committed, which keeps the mapping injective on both sides.
pub(crate) struct MatchState<'g> {
    graph_a: &'g Graph,
    graph_b: &'g Graph,
    candidates_a: Vec<NodeId>,
    candidates_b: Vec<NodeId>,
    available_a: BitVec,
    available_b: BitVec,
    mapping: Mapping,
}

impl<'g> MatchState<'g> {
    pub(crate) fn new(
        graph_a: &'g Graph,
        graph_b: &'g Graph,
        blank_a: &[NodeId],
        blank_b: &[NodeId],
    ) -> Self {
        let (candidates_a, available_a) = candidates(graph_a, blank_a);
        let (candidates_b, available_b) = candidates(graph_b, blank_b);
        Self {
            graph_a,
            graph_b,
            candidates_a,
            candidates_b,
            available_a,
            available_b,
            mapping: Mapping::new(),
        }
    }

    pub(crate) fn candidates_a(&self) -> &[NodeId] {
        &self.candidates_a
    }

    pub(crate) fn candidates_b(&self) -> &[NodeId] {
        &self.candidates_b
    }

    pub(crate) fn available_a(&self, node: NodeId) -> bool {
        self.available_a.get(node.index()).is_some_and(|bit| *bit)
    }

    pub(crate) fn available_b(&self, node: NodeId) -> bool {
        self.available_b.get(node.index()).is_some_and(|bit| *bit)
    }

    pub(crate) fn is_available(&self, a: NodeId, b: NodeId) -> bool {
        self.available_a(a) && self.available_b(b)
    }

    pub(crate) fn commit(&mut self, a: NodeId, b: NodeId, tier: Tier) -> Result<()> {
        self.mapping
            .insert(self.graph_a.lexical(a), self.graph_b.lexical(b), tier)?;
        self.available_a.set(a.index(), false);
        self.available_b.set(b.index(), false);
        Ok(())
    }

    /// Pairs every remaining A node with the closest remaining B node.
    /// Stops early, leaving A nodes unmatched, once B is exhausted.
    pub(crate) fn commit_nearest(
        &mut self,
        signatures_a: &SignatureTable,
        signatures_b: &SignatureTable,
    ) -> Result<()> {
        let remaining: Vec<NodeId> = self
            .candidates_a
            .iter()
            .copied()
            .filter(|&a| self.available_a(a))
            .collect();
        for a in remaining {
            let sig_a = signatures_a.require(self.graph_a, a)?.as_str();
            let mut closest: Option<(i64, NodeId)> = None;
            for &b in &self.candidates_b {
                if !self.available_b(b) {
                    continue;
                }
                let sig_b = signatures_b.require(self.graph_b, b)?.as_str();
                let candidate = (dissimilarity(sig_a, sig_b), b);
                if closest.map_or(true, |c| candidate < c) {
                    closest = Some(candidate);
                }
            }
            match closest {
                Some((_, b)) => self.commit(a, b, Tier::Nearest)?,
                None => break,
            }
        }
        Ok(())
    }

    pub(crate) fn into_report(self) -> MatchReport {
        let unmatched = |graph: &Graph, nodes: &[NodeId], available: &BitVec| -> Vec<String> {
            nodes
                .iter()
                .filter(|n| available[n.index()])
                .map(|&n| graph.lexical(n).to_string())
                .collect()
        };
        let unmatched_a = unmatched(self.graph_a, &self.candidates_a, &self.available_a);
        let unmatched_b = unmatched(self.graph_b, &self.candidates_b, &self.available_b);
        if !unmatched_a.is_empty() {
            debug!(
                unmatched = unmatched_a.len(),
                "Mapping incomplete: more blank nodes in A than in B"
            );
        }
        MatchReport {
            mapping: self.mapping,
            unmatched_a,
            unmatched_b,
        }
    }
}
