//! Radius-bounded signature matching.
//!
//! Phase 1 seeds a co-traversal from every pair of unmatched nodes sharing a
//! signature. A traversal that closes its component without divergence commits
//! the whole component at once; otherwise the seed pair is filed as `Exact`
//! (radius exhausted) or `Best(r)` (diverged after `r` verified hops).
//! Phase 2 commits `Exact` pairs, phase 3 commits `Best` pairs from the highest
//! `r` down, and phase 4 pairs whatever is left by signature dissimilarity.

use super::{index_by_signature, signature_tables, Aligner, MatchState};
use crate::config::{MatchConfig, Radius};
use crate::error::Result;
use crate::graph::Graph;
use crate::mapping::{MatchReport, Tier};
use crate::node::NodeId;
use crate::order::NeighborOrderer;
use crate::signature::{connection_label, SignatureTable};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SeedOutcome {
    /// Every pair of the closed component, seed first.
    Component(Vec<(NodeId, NodeId)>),
    Exact,
    Best(u32),
}

#[derive(Debug, Clone, Default)]
pub struct RSignMatcher {
    config: MatchConfig,
}

impl RSignMatcher {
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_radius(radius: Radius) -> Result<Self> {
        Self::new(MatchConfig::with_radius(radius))
    }

    pub fn radius(&self) -> Radius {
        self.config.radius
    }
}

impl Aligner for RSignMatcher {
    fn compute_mapping(
        &self,
        graph_a: &Graph,
        graph_b: &Graph,
        blank_a: &[NodeId],
        blank_b: &[NodeId],
    ) -> Result<MatchReport> {
        self.config.validate()?;
        let radius = self.config.radius;
        let (signatures_a, signatures_b) = signature_tables(graph_a, graph_b)?;
        let mut orderer_a =
            NeighborOrderer::new(graph_a, &signatures_a)?.with_depth_limit(radius.depth_limit());
        let mut orderer_b =
            NeighborOrderer::new(graph_b, &signatures_b)?.with_depth_limit(radius.depth_limit());

        let mut state = MatchState::new(graph_a, graph_b, blank_a, blank_b);
        let seeds_by_signature = index_by_signature(graph_b, &signatures_b, state.candidates_b())?;
        debug!(
            %radius,
            blank_a = state.candidates_a().len(),
            blank_b = state.candidates_b().len(),
            "Starting radius-bounded matching"
        );

        let mut exact: Vec<(NodeId, NodeId)> = Vec::new();
        let mut best: BTreeMap<u32, Vec<(NodeId, NodeId)>> = BTreeMap::new();
        let mut components = 0usize;

        for a in state.candidates_a().to_vec() {
            if !state.available_a(a) {
                continue;
            }
            let signature = signatures_a.require(graph_a, a)?;
            let Some(seeds) = seeds_by_signature.get(signature) else {
                continue;
            };
            for &b in seeds {
                if !state.available_b(b) {
                    continue;
                }
                let outcome = co_traverse(
                    (a, b),
                    (&mut orderer_a, &mut orderer_b),
                    (&signatures_a, &signatures_b),
                    &state,
                    radius,
                );
                trace!(a = graph_a.lexical(a), b = graph_b.lexical(b), ?outcome, "Seed traversed");
                match outcome {
                    SeedOutcome::Component(pairs) => {
                        for (x, y) in pairs {
                            state.commit(x, y, Tier::ExactComponent)?;
                        }
                        components += 1;
                        break;
                    }
                    SeedOutcome::Exact => exact.push((a, b)),
                    SeedOutcome::Best(r) => best.entry(r).or_default().push((a, b)),
                }
            }
        }
        debug!(
            components,
            exact = exact.len(),
            best = best.values().map(Vec::len).sum::<usize>(),
            "Co-traversal finished"
        );

        for (a, b) in exact {
            if state.is_available(a, b) {
                state.commit(a, b, Tier::Exact)?;
            }
        }
        for (r, pairs) in best.into_iter().rev() {
            for (a, b) in pairs {
                if state.is_available(a, b) {
                    state.commit(a, b, Tier::Best(r))?;
                }
            }
        }

        state.commit_nearest(&signatures_a, &signatures_b)?;
        let report = state.into_report();
        debug!(
            mapped = report.mapping.len(),
            unmatched_a = report.unmatched_a.len(),
            "Radius-bounded matching finished"
        );
        Ok(report)
    }
}

/// Abandoned choices one seed may accumulate before its walk gives up.
const BACKTRACK_LIMIT: usize = 100_000;

/// Neighbourhoods of one paired node, with the labels of the joining edges.
struct Expansion {
    around_x: Arc<[NodeId]>,
    around_y: Arc<[NodeId]>,
    labels_x: Vec<String>,
    labels_y: Vec<String>,
    viable: bool,
}

/// One decision of the walk: the partner picked for neighbour `slot` of the
/// pair at `pair`, with the alternatives still untried.
struct Choice {
    pair: usize,
    slot: usize,
    options: Vec<NodeId>,
    tried: usize,
    created: bool,
}

/// Breadth-synchronised walk from a seed pair.
///
/// Pairs are expanded in discovery order, which is level order: the seed is
/// level 1 and a pair found while expanding level `d` sits at level `d + 1`.
/// Expanding `(x, y)` pairs every blank neighbour `p` of `x` with a distinct
/// neighbour `q` of `y` that has the same signature and is joined by the same
/// edge labels. The positional partner in the orderings is tried first. An
/// earlier pairing of `p` must be reused, a new pair must still be available.
/// When no partner fits, the walk backtracks to the latest open choice.
///
/// Expanding every pair closes the component. Reaching a pair at level `R`
/// (levels beyond 1 only) exhausts the radius. If every alternative fails, the
/// deepest level whose expansion failed is reported.
fn co_traverse(
    seed: (NodeId, NodeId),
    orderers: (&mut NeighborOrderer<'_>, &mut NeighborOrderer<'_>),
    signatures: (&SignatureTable, &SignatureTable),
    state: &MatchState<'_>,
    radius: Radius,
) -> SeedOutcome {
    let (orderer_a, orderer_b) = orderers;
    let (signatures_a, signatures_b) = signatures;
    let (graph_a, graph_b) = (orderer_a.graph(), orderer_b.graph());

    let mut partner_of_a: HashMap<NodeId, NodeId> = HashMap::from([(seed.0, seed.1)]);
    let mut partner_of_b: HashMap<NodeId, NodeId> = HashMap::from([(seed.1, seed.0)]);
    let mut pairs: Vec<(NodeId, NodeId, u32)> = vec![(seed.0, seed.1, 1)];
    // (pair index, B node) already taken while expanding that pair.
    let mut taken: HashSet<(usize, NodeId)> = HashSet::new();
    let mut expansions: HashMap<(NodeId, NodeId), Arc<Expansion>> = HashMap::new();
    let mut choices: Vec<Choice> = Vec::new();
    let mut cursor = (0usize, 0usize);
    let mut deepest_failure = 1u32;
    let mut backtracks = 0usize;

    loop {
        let (pair, slot) = cursor;
        let Some(&(x, y, level)) = pairs.get(pair) else {
            return SeedOutcome::Component(pairs.iter().map(|&(p, q, _)| (p, q)).collect());
        };
        if level > 1 && radius.is_reached(level) {
            return SeedOutcome::Exact;
        }

        let expansion = Arc::clone(expansions.entry((x, y)).or_insert_with(|| {
            let around_x = orderer_a.order(x);
            let around_y = orderer_b.order(y);
            let labels_x: Vec<String> =
                around_x.iter().map(|&p| connection_label(graph_a, x, p)).collect();
            let labels_y: Vec<String> =
                around_y.iter().map(|&q| connection_label(graph_b, y, q)).collect();
            let viable = around_x.len() == around_y.len()
                && connection_label(graph_a, x, x) == connection_label(graph_b, y, y);
            Arc::new(Expansion {
                around_x,
                around_y,
                labels_x,
                labels_y,
                viable,
            })
        }));

        let options = if !expansion.viable {
            Vec::new()
        } else if slot == expansion.around_x.len() {
            cursor = (pair + 1, 0);
            continue;
        } else {
            let p = expansion.around_x[slot];
            let fits = |j: usize| {
                let q = expansion.around_y[j];
                expansion.labels_x[slot] == expansion.labels_y[j]
                    && signatures_a.get(p) == signatures_b.get(q)
                    && !taken.contains(&(pair, q))
                    && match partner_of_a.get(&p) {
                        Some(&partner) => partner == q,
                        None => !partner_of_b.contains_key(&q) && state.is_available(p, q),
                    }
            };
            let positional = (slot < expansion.around_y.len()).then_some(slot);
            positional
                .into_iter()
                .chain((0..expansion.around_y.len()).filter(|&j| j != slot))
                .filter(|&j| fits(j))
                .map(|j| expansion.around_y[j])
                .collect()
        };

        if !options.is_empty() {
            let mut choice = Choice {
                pair,
                slot,
                options,
                tried: 0,
                created: false,
            };
            let p = expansion.around_x[slot];
            apply(&mut choice, p, level, &mut pairs, &mut partner_of_a, &mut partner_of_b, &mut taken);
            choices.push(choice);
            cursor = (pair, slot + 1);
            continue;
        }

        deepest_failure = deepest_failure.max(level);
        loop {
            let Some(choice) = choices.last_mut() else {
                return SeedOutcome::Best(deepest_failure);
            };
            undo(choice, &mut pairs, &mut partner_of_a, &mut partner_of_b, &mut taken);
            if choice.tried < choice.options.len() {
                backtracks += 1;
                if backtracks > BACKTRACK_LIMIT {
                    return SeedOutcome::Best(deepest_failure);
                }
                let (x, y, level) = pairs[choice.pair];
                let p = expansions[&(x, y)].around_x[choice.slot];
                apply(choice, p, level, &mut pairs, &mut partner_of_a, &mut partner_of_b, &mut taken);
                cursor = (choice.pair, choice.slot + 1);
                break;
            }
            choices.pop();
        }
    }
}

/// Commits the next untried option of `choice` as the partner of `p`.
fn apply(
    choice: &mut Choice,
    p: NodeId,
    level: u32,
    pairs: &mut Vec<(NodeId, NodeId, u32)>,
    partner_of_a: &mut HashMap<NodeId, NodeId>,
    partner_of_b: &mut HashMap<NodeId, NodeId>,
    taken: &mut HashSet<(usize, NodeId)>,
) {
    let q = choice.options[choice.tried];
    choice.tried += 1;
    taken.insert((choice.pair, q));
    choice.created = !partner_of_a.contains_key(&p);
    if choice.created {
        partner_of_a.insert(p, q);
        partner_of_b.insert(q, p);
        pairs.push((p, q, level + 1));
    }
}

/// Reverts the option of `choice` applied last.
fn undo(
    choice: &mut Choice,
    pairs: &mut Vec<(NodeId, NodeId, u32)>,
    partner_of_a: &mut HashMap<NodeId, NodeId>,
    partner_of_b: &mut HashMap<NodeId, NodeId>,
    taken: &mut HashSet<(usize, NodeId)>,
) {
    let q = choice.options[choice.tried - 1];
    taken.remove(&(choice.pair, q));
    if choice.created {
        if let Some((p, q, _)) = pairs.pop() {
            partner_of_a.remove(&p);
            partner_of_b.remove(&q);
        }
        choice.created = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn graph(triples: &[(&str, &str, &str)]) -> Graph {
        let mut g = Graph::new();
        for &(s, p, o) in triples {
            g.add_triple(Node::iri(s), p, Node::iri(o)).unwrap();
        }
        g
    }

    /// Classifies the seed pair (`a`, `b`) without committing anything.
    fn classify(ga: &Graph, gb: &Graph, a: &str, b: &str, radius: Radius) -> SeedOutcome {
        walk(ga, gb, (a, b), radius, radius.depth_limit())
    }

    fn walk(
        ga: &Graph,
        gb: &Graph,
        (a, b): (&str, &str),
        radius: Radius,
        depth_limit: Option<usize>,
    ) -> SeedOutcome {
        let sa = SignatureTable::compute(ga).unwrap();
        let sb = SignatureTable::compute(gb).unwrap();
        let mut oa = NeighborOrderer::new(ga, &sa)
            .unwrap()
            .with_depth_limit(depth_limit);
        let mut ob = NeighborOrderer::new(gb, &sb)
            .unwrap()
            .with_depth_limit(depth_limit);
        let state = MatchState::new(ga, gb, &ga.blank_nodes(), &gb.blank_nodes());
        let seed = (ga.lookup_iri(a).unwrap(), gb.lookup_iri(b).unwrap());
        co_traverse(seed, (&mut oa, &mut ob), (&sa, &sb), &state, radius)
    }

    /// anchor -> c1 -> c2 -> c3 -> tail
    fn chain(prefix: &str, tail: &str) -> Graph {
        let c1 = format!("{prefix}c1");
        let c2 = format!("{prefix}c2");
        let c3 = format!("{prefix}c3");
        graph(&[
            ("anchor", "p", c1.as_str()),
            (c1.as_str(), "q", c2.as_str()),
            (c2.as_str(), "q", c3.as_str()),
            (c3.as_str(), "r", tail),
        ])
    }

    #[test]
    fn isolated_node_closes_immediately() {
        let a = graph(&[("■0■x", "p", "r1"), ("■0■x", "p", "r2")]);
        let b = graph(&[("■1■y", "p", "r1"), ("■1■y", "p", "r2")]);
        let outcome = classify(&a, &b, "■0■x", "■1■y", Radius::Hops(1));
        assert!(matches!(outcome, SeedOutcome::Component(ref pairs) if pairs.len() == 1));
    }

    #[test]
    fn closed_chain_is_a_component_at_any_sufficient_radius() {
        let a = chain("■0■", "end");
        let b = chain("■1■", "end");
        for radius in [Radius::Hops(4), Radius::Hops(7), Radius::Unbounded] {
            match classify(&a, &b, "■0■c1", "■1■c1", radius) {
                SeedOutcome::Component(pairs) => assert_eq!(pairs.len(), 3),
                other => panic!("expected component at radius {radius}, got {other:?}"),
            }
        }
    }

    #[test]
    fn radius_exhaustion_files_exact() {
        let a = chain("■0■", "end");
        let b = chain("■1■", "end");
        assert_eq!(
            classify(&a, &b, "■0■c1", "■1■c1", Radius::Hops(2)),
            SeedOutcome::Exact
        );
    }

    #[test]
    fn divergence_files_best_by_verified_depth() {
        // The chains differ only at their far end.
        let a = chain("■0■", "end");
        let b = chain("■1■", "elsewhere");
        assert_eq!(
            classify(&a, &b, "■0■c1", "■1■c1", Radius::Unbounded),
            SeedOutcome::Best(2)
        );
        // A larger radius cannot lower the verified depth.
        assert_eq!(
            classify(&a, &b, "■0■c1", "■1■c1", Radius::Hops(9)),
            SeedOutcome::Best(2)
        );
    }

    #[test]
    fn exact_tier_is_committed_before_nearest() {
        let a = chain("■0■", "end");
        let b = chain("■1■", "end");
        let matcher = RSignMatcher::with_radius(Radius::Hops(2)).unwrap();
        let report = matcher.align(&a, &b).unwrap();
        assert_eq!(report.mapping.get("■0■c1"), Some("■1■c1"));
        assert_eq!(report.mapping.tier("■0■c1"), Some(Tier::Exact));
        assert!(report.is_complete());
    }

    #[test]
    fn crossed_edge_roles_are_not_paired() {
        // b2 and b3 share a signature, as do b0 and b4; only the predicates
        // joining them tell the pairs apart.
        let edges = [
            ("■0■b4", "q", "■0■b2"),
            ("■0■b0", "p", "■0■b2"),
            ("■0■b0", "q", "■0■b3"),
            ("■0■b4", "p", "■0■b3"),
        ];
        let renamed: Vec<(String, &str, String)> = edges
            .iter()
            .rev()
            .map(|&(s, p, o)| (s.replacen("■0■", "■1■", 1), p, o.replacen("■0■", "■1■", 1)))
            .collect();
        let a = graph(&edges);
        let b = graph(
            &renamed
                .iter()
                .map(|(s, p, o)| (s.as_str(), *p, o.as_str()))
                .collect::<Vec<_>>(),
        );

        let report = RSignMatcher::default().align(&a, &b).unwrap();
        assert_eq!(report.mapping.len(), 4);
        assert!(report
            .mapping
            .iter()
            .all(|(_, _, tier)| tier == Tier::ExactComponent));
        assert!(a.apply_mapping(&report.mapping).unwrap().same_triples(&b));
    }

    #[test]
    fn walk_backtracks_out_of_a_wrong_positional_pairing() {
        // y and z only differ two hops below x. Without tie-breaking walks the
        // orderings follow insertion order, which is swapped in b.
        let a = graph(&[
            ("■0■x", "p", "■0■y"),
            ("■0■x", "p", "■0■z"),
            ("■0■y", "r", "■0■y2"),
            ("■0■z", "r", "■0■z2"),
            ("■0■y2", "s", "zeta"),
            ("■0■z2", "s", "alpha"),
        ]);
        let b = graph(&[
            ("■1■x", "p", "■1■z"),
            ("■1■x", "p", "■1■y"),
            ("■1■z", "r", "■1■z2"),
            ("■1■y", "r", "■1■y2"),
            ("■1■y2", "s", "zeta"),
            ("■1■z2", "s", "alpha"),
        ]);
        let outcome = walk(&a, &b, ("■0■x", "■1■x"), Radius::Unbounded, Some(0));
        let SeedOutcome::Component(pairs) = outcome else {
            panic!("expected a closed component, got {outcome:?}");
        };
        let named: Vec<(&str, &str)> = pairs
            .iter()
            .map(|&(p, q)| (a.lexical(p), b.lexical(q)))
            .collect();
        assert_eq!(named.len(), 5);
        assert!(named.contains(&("■0■y", "■1■y")));
        assert!(named.contains(&("■0■z2", "■1■z2")));
    }

    #[test]
    fn zero_radius_is_rejected() {
        assert!(RSignMatcher::with_radius(Radius::Hops(0)).is_err());
    }
}
