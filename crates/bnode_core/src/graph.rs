//! Minimal triple store: interned terms, set semantics, wildcard lookups.
//!
//! Everything the alignment engine reads goes through [`Graph::find`] and the
//! neighbour helpers. Terms are interned once, so a [`NodeId`] is stable for
//! the lifetime of the snapshot and can key every per-run cache.

use crate::error::{AlignError, Result};
use crate::interner::Interner;
use crate::mapping::Mapping;
use crate::node::{shorten, Node, NodeId, PredicateId, Triple, BNODE_PREFIX};
use arrow::array::{Array, BooleanArray, StringArray};
use arrow::record_batch::RecordBatch;
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Interner<Node>,
    predicates: Interner<String>,
    triples: Vec<Triple>,
    present: HashSet<Triple>,
    // Triple positions per node, in insertion order.
    outgoing: Vec<Vec<u32>>,
    incoming: Vec<Vec<u32>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a triple. Returns `false` if it was already present.
    pub fn add_triple(&mut self, subject: Node, predicate: &str, object: Node) -> Result<bool> {
        if let Node::Literal(value) = &subject {
            return Err(AlignError::LiteralSubject(value.clone()));
        }
        let subject = self.intern_node(&subject);
        let predicate = PredicateId(self.predicates.intern(&predicate.to_string()));
        let object = self.intern_node(&object);

        let triple = Triple {
            subject,
            predicate,
            object,
        };
        if !self.present.insert(triple) {
            return Ok(false);
        }
        let pos = self.triples.len() as u32;
        self.triples.push(triple);
        self.outgoing[subject.index()].push(pos);
        self.incoming[object.index()].push(pos);
        Ok(true)
    }

    fn intern_node(&mut self, node: &Node) -> NodeId {
        let id = self.nodes.intern(node) as usize;
        if id >= self.outgoing.len() {
            self.outgoing.resize_with(id + 1, Vec::new);
            self.incoming.resize_with(id + 1, Vec::new);
        }
        NodeId(id as u32)
    }

    /// Hydrates the graph from an Arrow batch with Utf8 columns `subject`,
    /// `predicate`, `object` and an optional Boolean column `literal` marking
    /// literal objects. Returns the number of new triples.
    pub fn add_arrow_batch(&mut self, batch: &RecordBatch) -> Result<usize> {
        let subjects = utf8_column(batch, "subject")?;
        let predicates = utf8_column(batch, "predicate")?;
        let objects = utf8_column(batch, "object")?;
        let literals = match batch.column_by_name("literal") {
            Some(col) => Some(
                col.as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| AlignError::Column("column literal is not Boolean".into()))?,
            ),
            None => None,
        };

        let mut added = 0;
        for row in 0..batch.num_rows() {
            if subjects.is_null(row) || predicates.is_null(row) || objects.is_null(row) {
                return Err(AlignError::Column(format!("null term in row {row}")));
            }
            let is_literal = literals.is_some_and(|l| !l.is_null(row) && l.value(row));
            let object = if is_literal {
                Node::literal(objects.value(row))
            } else {
                Node::iri(objects.value(row))
            };
            if self.add_triple(Node::iri(subjects.value(row)), predicates.value(row), object)? {
                added += 1;
            }
        }
        debug!(rows = batch.num_rows(), added, "Loaded triple batch");
        Ok(added)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn triple_count(&self) -> usize {
        self.triples.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.lookup(id.0)
    }

    /// The IRI or lexical form of a node, empty for unknown ids.
    pub fn lexical(&self, id: NodeId) -> &str {
        self.node(id).map(Node::lexical).unwrap_or_default()
    }

    pub fn lookup_id(&self, node: &Node) -> Option<NodeId> {
        self.nodes.lookup_id(node).map(NodeId)
    }

    pub fn lookup_iri(&self, iri: &str) -> Option<NodeId> {
        self.lookup_id(&Node::iri(iri))
    }

    pub fn predicate(&self, iri: &str) -> Option<PredicateId> {
        self.predicates.lookup_id(&iri.to_string()).map(PredicateId)
    }

    pub fn predicate_iri(&self, id: PredicateId) -> &str {
        self.predicates.lookup(id.0).map(String::as_str).unwrap_or_default()
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    /// Wildcard lookup; `None` matches anything.
    pub fn find(
        &self,
        subject: Option<NodeId>,
        predicate: Option<PredicateId>,
        object: Option<NodeId>,
    ) -> Vec<Triple> {
        let matches = |t: &Triple| {
            subject.map_or(true, |s| t.subject == s)
                && predicate.map_or(true, |p| t.predicate == p)
                && object.map_or(true, |o| t.object == o)
        };
        let positions = match (subject, object) {
            (Some(s), _) => self.outgoing.get(s.index()),
            (None, Some(o)) => self.incoming.get(o.index()),
            (None, None) => return self.triples.iter().copied().filter(|t| matches(t)).collect(),
        };
        positions
            .map(|ps| {
                ps.iter()
                    .map(|&pos| self.triples[pos as usize])
                    .filter(|t| matches(t))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_blank(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(Node::is_blank)
    }

    /// All blank nodes, in index order.
    pub fn blank_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.is_blank())
            .map(|(id, _)| NodeId(id))
            .collect()
    }

    /// Distinct nodes sharing a triple with `id` (subjects of incoming triples
    /// first, then objects of outgoing ones), excluding `id` itself.
    pub fn neighbours(&self, id: NodeId) -> Vec<NodeId> {
        let incoming = self.incoming.get(id.index()).into_iter().flatten();
        let outgoing = self.outgoing.get(id.index()).into_iter().flatten();
        let mut seen = HashSet::new();
        incoming
            .map(|&pos| self.triples[pos as usize].subject)
            .chain(outgoing.map(|&pos| self.triples[pos as usize].object))
            .filter(|&n| n != id && seen.insert(n))
            .collect()
    }

    pub fn blank_neighbours(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbours(id)
            .into_iter()
            .filter(|&n| self.is_blank(n))
            .collect()
    }

    /// Connected components of the subgraph induced by blank nodes.
    /// Each component is sorted; components are ordered by their first member.
    pub fn blank_components(&self) -> Vec<Vec<NodeId>> {
        let mut seen = bitvec![0; self.node_count()];
        let mut components = Vec::new();
        for start in self.blank_nodes() {
            if seen[start.index()] {
                continue;
            }
            seen.set(start.index(), true);
            let mut component = vec![start];
            let mut cursor = 0;
            while cursor < component.len() {
                for n in self.blank_neighbours(component[cursor]) {
                    if !seen[n.index()] {
                        seen.set(n.index(), true);
                        component.push(n);
                    }
                }
                cursor += 1;
            }
            component.sort();
            components.push(component);
        }
        components
    }

    /// Largest number of hops any blank node needs to reach a non-blank neighbour.
    /// A blank node whose component has no anchor counts its component's depth.
    pub fn max_anchor_radius(&self) -> Option<usize> {
        self.blank_nodes()
            .into_iter()
            .map(|b| self.anchor_distance(b))
            .max()
    }

    fn anchor_distance(&self, start: NodeId) -> usize {
        let mut seen = HashSet::from([start]);
        let mut frontier = vec![start];
        let mut radius = 1;
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node in frontier {
                for n in self.neighbours(node) {
                    if !self.is_blank(n) {
                        return radius;
                    }
                    if seen.insert(n) {
                        next.push(n);
                    }
                }
            }
            frontier = next;
            radius += 1;
        }
        radius
    }

    /// Rewrites every blank node through `mapping` (keys are this graph's blank IRIs).
    pub fn apply_mapping(&self, mapping: &Mapping) -> Result<Graph> {
        self.map_terms(|node| match node {
            Node::Blank(iri) => mapping
                .get(iri)
                .map(Node::iri)
                .ok_or_else(|| AlignError::Unmapped(iri.clone())),
            other => Ok(other.clone()),
        })
    }

    /// Replaces side-marked blank IRIs (`■0■x`, `■1■x`) by `■x`.
    pub fn strip_side_prefixes(&self) -> Result<Graph> {
        self.map_terms(|node| match node {
            Node::Blank(iri) if shorten(iri) != iri => {
                Ok(Node::Blank(format!("{BNODE_PREFIX}{}", shorten(iri))))
            }
            other => Ok(other.clone()),
        })
    }

    fn map_terms(&self, mut f: impl FnMut(&Node) -> Result<Node>) -> Result<Graph> {
        let mut out = Graph::new();
        for t in &self.triples {
            let subject = f(self.term(t.subject))?;
            let object = f(self.term(t.object))?;
            out.add_triple(subject, self.predicate_iri(t.predicate), object)?;
        }
        Ok(out)
    }

    // Triples only reference interned nodes.
    fn term(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Triple-set equality by term value, independent of interning order.
    pub fn same_triples(&self, other: &Graph) -> bool {
        self.triple_count() == other.triple_count() && self.value_set() == other.value_set()
    }

    fn value_set(&self) -> HashSet<(&Node, &str, &Node)> {
        self.triples
            .iter()
            .map(|t| (self.term(t.subject), self.predicate_iri(t.predicate), self.term(t.object)))
            .collect()
    }

    /// Writes a bincode snapshot of the graph.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Graph> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

fn utf8_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AlignError::Column(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AlignError::Column(format!("column {name} is not Utf8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Tier;
    use arrow::array::ArrayRef;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.add_triple(Node::iri("■0■a"), "p", Node::iri("■0■b")).unwrap();
        g.add_triple(Node::iri("■0■b"), "q", Node::iri("http://x")).unwrap();
        g.add_triple(Node::iri("■0■b"), "name", Node::literal("Bob")).unwrap();
        g.add_triple(Node::iri("■0■c"), "p", Node::iri("■0■d")).unwrap();
        g
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut g = sample();
        assert!(!g.add_triple(Node::iri("■0■a"), "p", Node::iri("■0■b")).unwrap());
        assert_eq!(g.triple_count(), 4);
    }

    #[test]
    fn literal_subjects_are_rejected() {
        let mut g = Graph::new();
        let err = g.add_triple(Node::literal("x"), "p", Node::iri("y")).unwrap_err();
        assert!(matches!(err, AlignError::LiteralSubject(_)));
    }

    #[test]
    fn wildcard_lookup() {
        let g = sample();
        let b = g.lookup_iri("■0■b").unwrap();
        let p = g.predicate("p").unwrap();
        assert_eq!(g.find(Some(b), None, None).len(), 2);
        assert_eq!(g.find(None, None, Some(b)).len(), 1);
        assert_eq!(g.find(None, Some(p), None).len(), 2);
        assert_eq!(g.find(Some(b), Some(p), None).len(), 0);
        assert_eq!(g.find(None, None, None).len(), 4);
    }

    #[test]
    fn neighbours_and_components() {
        let g = sample();
        let b = g.lookup_iri("■0■b").unwrap();
        assert_eq!(g.neighbours(b).len(), 3);
        assert_eq!(g.blank_neighbours(b), vec![g.lookup_iri("■0■a").unwrap()]);
        assert_eq!(g.blank_nodes().len(), 4);

        let components = g.blank_components();
        assert_eq!(components.len(), 2);
        assert!(components.iter().all(|c| c.len() == 2));
        // ■0■c and ■0■d never reach an anchor: their whole component is walked.
        assert_eq!(g.max_anchor_radius(), Some(3));
    }

    #[test]
    fn anchor_radius_counts_hops() {
        let mut g = Graph::new();
        g.add_triple(Node::iri("■0■a"), "p", Node::iri("■0■b")).unwrap();
        g.add_triple(Node::iri("■0■b"), "p", Node::iri("■0■c")).unwrap();
        g.add_triple(Node::iri("■0■c"), "p", Node::iri("http://x")).unwrap();
        assert_eq!(g.max_anchor_radius(), Some(3));
        assert_eq!(Graph::new().max_anchor_radius(), None);
    }

    #[test]
    fn mapping_and_prefix_stripping() {
        let g = sample();
        let mut mapping = Mapping::new();
        for (a, b) in [("■0■a", "■1■a"), ("■0■b", "■1■b"), ("■0■c", "■1■c"), ("■0■d", "■1■d")] {
            mapping.insert(a, b, Tier::Exact).unwrap();
        }
        let mapped = g.apply_mapping(&mapping).unwrap();
        assert!(mapped.lookup_iri("■1■b").is_some());
        assert!(!mapped.same_triples(&g));
        assert!(mapped
            .strip_side_prefixes()
            .unwrap()
            .same_triples(&g.strip_side_prefixes().unwrap()));

        let mut partial = Mapping::new();
        partial.insert("■0■a", "■1■a", Tier::Exact).unwrap();
        assert!(matches!(g.apply_mapping(&partial), Err(AlignError::Unmapped(_))));
    }

    #[test]
    fn loads_arrow_batches() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("subject", DataType::Utf8, false),
            Field::new("predicate", DataType::Utf8, false),
            Field::new("object", DataType::Utf8, false),
            Field::new("literal", DataType::Boolean, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["■0■a", "■0■a", "■0■a"])) as ArrayRef,
                Arc::new(StringArray::from(vec!["p", "name", "p"])) as ArrayRef,
                Arc::new(StringArray::from(vec!["■0■b", "Ann", "■0■b"])) as ArrayRef,
                Arc::new(BooleanArray::from(vec![false, true, false])) as ArrayRef,
            ],
        )
        .unwrap();

        let mut g = Graph::new();
        assert_eq!(g.add_arrow_batch(&batch).unwrap(), 2);
        assert!(g.lookup_id(&Node::literal("Ann")).is_some());
        assert_eq!(g.blank_nodes().len(), 2);
    }

    #[test]
    fn arrow_batch_requires_term_columns() {
        let schema = Arc::new(Schema::new(vec![Field::new("subject", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["■0■a"])) as ArrayRef],
        )
        .unwrap();
        let err = Graph::new().add_arrow_batch(&batch).unwrap_err();
        assert!(matches!(err, AlignError::Column(_)));
    }

    #[test]
    fn snapshot_round_trip() {
        let g = sample();
        let path = std::env::temp_dir().join(format!("bnode_core_graph_{}.bin", std::process::id()));
        g.save_to_file(&path).unwrap();
        let loaded = Graph::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(loaded.same_triples(&g));
        let b = loaded.lookup_iri("■0■b").unwrap();
        assert_eq!(loaded.find(Some(b), None, None).len(), 2);
    }
}
