//! In-memory attributed graph built from persisted triples.
//!
//! Nodes are entities, edges are relations. Parallel relations between the
//! same ordered pair collapse into one edge that keeps every predicate, the
//! highest confidence seen and whether all of them were inferred.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use kgraph_core::TripleRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedNode {
    pub key: String,
    pub name: String,
    pub entity_type: String,
}

/// One merged edge. `from`/`to` index into [`AttributedGraph::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedEdge {
    pub from: usize,
    pub to: usize,
    pub predicates: BTreeSet<String>,
    pub confidence: f64,
    pub inferred: bool,
    /// Number of relations merged into this edge.
    pub multiplicity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributedGraph {
    pub graph_id: String,
    pub nodes: Vec<AttributedNode>,
    pub edges: Vec<AttributedEdge>,
}

impl AttributedGraph {
    /// Build from the triples of one graph. Nodes keep first-seen order.
    pub fn from_triples(graph_id: &str, triples: &[TripleRecord]) -> Self {
        let mut graph = Self { graph_id: graph_id.to_string(), ..Self::default() };
        let mut node_index: HashMap<String, usize> = HashMap::new();
        let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();

        for triple in triples {
            let from = graph.intern(
                &mut node_index,
                &triple.subject_key,
                &triple.subject,
                &triple.subject_type,
            );
            let to = graph.intern(
                &mut node_index,
                &triple.object_key,
                &triple.object,
                &triple.object_type,
            );

            match edge_index.get(&(from, to)) {
                Some(&i) => {
                    let edge = &mut graph.edges[i];
                    edge.predicates.insert(triple.predicate.clone());
                    edge.confidence = edge.confidence.max(triple.confidence);
                    edge.inferred &= triple.inferred;
                    edge.multiplicity += 1;
                }
                None => {
                    edge_index.insert((from, to), graph.edges.len());
                    graph.edges.push(AttributedEdge {
                        from,
                        to,
                        predicates: BTreeSet::from([triple.predicate.clone()]),
                        confidence: triple.confidence,
                        inferred: triple.inferred,
                        multiplicity: 1,
                    });
                }
            }
        }
        graph
    }

    fn intern(
        &mut self,
        index: &mut HashMap<String, usize>,
        key: &str,
        name: &str,
        entity_type: &str,
    ) -> usize {
        if let Some(&i) = index.get(key) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(AttributedNode {
            key: key.to_string(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
        });
        index.insert(key.to_string(), i);
        i
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Display name of node `i`.
    pub fn name(&self, i: usize) -> &str {
        &self.nodes[i].name
    }

    /// Entity key of node `i`.
    pub fn key(&self, i: usize) -> &str {
        &self.nodes[i].key
    }
}
