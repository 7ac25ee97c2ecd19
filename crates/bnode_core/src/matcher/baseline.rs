//! Single-pass signature matching without co-traversal.
//!
//! Used as a lower bound for [`RSignMatcher`](super::RSignMatcher): equal
//! one-hop signatures are matched directly, everything else falls back to the
//! nearest remaining signature.

use super::{index_by_signature, signature_tables, Aligner, MatchState};
use crate::error::Result;
use crate::graph::Graph;
use crate::mapping::{MatchReport, Tier};
use crate::node::NodeId;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineMatcher;

impl Aligner for BaselineMatcher {
    fn compute_mapping(
        &self,
        graph_a: &Graph,
        graph_b: &Graph,
        blank_a: &[NodeId],
        blank_b: &[NodeId],
    ) -> Result<MatchReport> {
        let (signatures_a, signatures_b) = signature_tables(graph_a, graph_b)?;
        let mut state = MatchState::new(graph_a, graph_b, blank_a, blank_b);
        let by_signature = index_by_signature(graph_b, &signatures_b, state.candidates_b())?;

        let mut exact = 0usize;
        for a in state.candidates_a().to_vec() {
            let signature = signatures_a.require(graph_a, a)?;
            let partner = by_signature
                .get(signature)
                .and_then(|bs| bs.iter().copied().find(|&b| state.available_b(b)));
            if let Some(b) = partner {
                state.commit(a, b, Tier::Exact)?;
                exact += 1;
            }
        }
        debug!(exact, "Baseline exact pass finished");

        state.commit_nearest(&signatures_a, &signatures_b)?;
        Ok(state.into_report())
    }
}
