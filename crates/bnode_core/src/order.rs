//! Cross-graph comparable ordering of a node's blank neighbours.
//!
//! A node's neighbours are keyed first by the labels of the edges joining them
//! to the node, so equal positions play equal edge roles, then by the neighbour
//! comparator. The comparator orders by signature and breaks ties by walking
//! both neighbourhoods in lockstep: each side's unvisited blank neighbours,
//! sorted by signature, are compared pairwise and recursively, and the first
//! differing pair decides. If every pair ties, the side with fewer neighbours
//! sorts first. Position `i` of an ordering in graph A can then be paired with
//! position `i` of the corresponding ordering in graph B.

use crate::error::Result;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::signature::{connection_label, SignatureTable};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Nodes already consumed by one walk, one set per side.
#[derive(Debug, Default)]
struct Visited {
    left: HashSet<NodeId>,
    right: HashSet<NodeId>,
}

/// A pair of equally signed nodes whose neighbourhoods are being compared.
struct Frame {
    left: Vec<NodeId>,
    right: Vec<NodeId>,
    next: usize,
    depth: usize,
}

/// Memoizing neighbour orderer for one graph snapshot.
pub struct NeighborOrderer<'g> {
    graph: &'g Graph,
    signatures: &'g SignatureTable,
    depth_limit: Option<usize>,
    cache: HashMap<NodeId, Arc<[NodeId]>>,
}

impl<'g> NeighborOrderer<'g> {
    /// Fails if `signatures` does not cover every blank node of `graph`.
    pub fn new(graph: &'g Graph, signatures: &'g SignatureTable) -> Result<Self> {
        signatures.covers(graph)?;
        Ok(Self {
            graph,
            signatures,
            depth_limit: None,
            cache: HashMap::new(),
        })
    }

    /// Bounds the depth of tie-breaking walks.
    pub fn with_depth_limit(mut self, limit: Option<usize>) -> Self {
        self.depth_limit = limit;
        self
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Blank neighbours of `node` in canonical order.
    pub fn order(&mut self, node: NodeId) -> Arc<[NodeId]> {
        if let Some(cached) = self.cache.get(&node) {
            return Arc::clone(cached);
        }
        let mut keyed: Vec<(String, NodeId)> = self
            .graph
            .blank_neighbours(node)
            .into_iter()
            .map(|n| (connection_label(self.graph, node, n), n))
            .collect();
        merge_sort_by(&mut keyed, &mut |x, y| {
            x.0.cmp(&y.0).then_with(|| self.compare(x.1, y.1))
        });
        let ordered: Arc<[NodeId]> = keyed.into_iter().map(|(_, n)| n).collect();
        self.cache.insert(node, Arc::clone(&ordered));
        ordered
    }

    /// Total preorder over blank nodes of this graph.
    ///
    /// The walk keeps its own stack, so its depth is bounded by memory rather
    /// than by the thread stack.
    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        let by_signature = self.signature(a).cmp(self.signature(b));
        if by_signature != Ordering::Equal || self.limit_reached(0) {
            return by_signature;
        }

        let mut visited = Visited::default();
        visited.left.insert(a);
        visited.right.insert(b);
        let mut stack = vec![self.frame(a, b, &visited, 0)];

        while let Some(top) = stack.last_mut() {
            if top.next < top.left.len().min(top.right.len()) {
                let (x, y) = (top.left[top.next], top.right[top.next]);
                let depth = top.depth + 1;
                top.next += 1;
                visited.left.insert(x);
                visited.right.insert(y);

                let ord = self.signature(x).cmp(self.signature(y));
                if ord != Ordering::Equal {
                    return ord;
                }
                if !self.limit_reached(depth) {
                    stack.push(self.frame(x, y, &visited, depth));
                }
            } else {
                let ord = top.left.len().cmp(&top.right.len());
                if ord != Ordering::Equal {
                    return ord;
                }
                stack.pop();
            }
        }
        Ordering::Equal
    }

    fn limit_reached(&self, depth: usize) -> bool {
        self.depth_limit.is_some_and(|limit| depth >= limit)
    }

    fn frame(&self, a: NodeId, b: NodeId, visited: &Visited, depth: usize) -> Frame {
        Frame {
            left: self.unvisited_by_signature(a, &visited.left),
            right: self.unvisited_by_signature(b, &visited.right),
            next: 0,
            depth,
        }
    }

    fn signature(&self, node: NodeId) -> &str {
        // Coverage is checked in `new`.
        self.signatures
            .get(node)
            .map(|s| s.as_str())
            .unwrap_or_default()
    }

    fn unvisited_by_signature(&self, node: NodeId, visited: &HashSet<NodeId>) -> Vec<NodeId> {
        let mut neighbours: Vec<NodeId> = self
            .graph
            .blank_neighbours(node)
            .into_iter()
            .filter(|n| !visited.contains(n))
            .collect();
        neighbours.sort_by(|x, y| self.signature(*x).cmp(self.signature(*y)));
        neighbours
    }
}

/// Stable merge sort that tolerates a comparator that is not transitive.
/// The lockstep walk above can be intransitive on cyclic structures, which
/// the standard library sorts are allowed to reject at runtime.
fn merge_sort_by<T: Clone>(items: &mut Vec<T>, cmp: &mut impl FnMut(&T, &T) -> Ordering) {
    if items.len() <= 1 {
        return;
    }
    let mut right = items.split_off(items.len() / 2);
    merge_sort_by(items, cmp);
    merge_sort_by(&mut right, cmp);

    let left = std::mem::take(items);
    items.reserve(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if cmp(&left[i], &right[j]) == Ordering::Greater {
            items.push(right[j].clone());
            j += 1;
        } else {
            items.push(left[i].clone());
            i += 1;
        }
    }
    items.extend_from_slice(&left[i..]);
    items.extend_from_slice(&right[j..]);
}
