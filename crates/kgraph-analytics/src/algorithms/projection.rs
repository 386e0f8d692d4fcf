//! petgraph views of an [`AttributedGraph`].

use std::collections::BTreeSet;

use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::Direction;

use crate::attributed::AttributedGraph;

/// Directed graph plus its undirected simple projection. Node `i` in both
/// graphs is node `i` of the attributed graph.
pub(super) struct Projection {
    pub directed: DiGraph<(), ()>,
    pub undirected: UnGraph<(), ()>,
    /// Undirected neighbours, self-loops excluded.
    pub neighbors: Vec<BTreeSet<usize>>,
}

impl Projection {
    pub fn new(graph: &AttributedGraph) -> Self {
        let n = graph.node_count();
        let mut directed = DiGraph::with_capacity(n, graph.edge_count());
        let mut undirected = UnGraph::with_capacity(n, graph.edge_count());
        for _ in 0..n {
            directed.add_node(());
            undirected.add_node(());
        }

        let mut neighbors = vec![BTreeSet::new(); n];
        for edge in &graph.edges {
            let (a, b) = (NodeIndex::new(edge.from), NodeIndex::new(edge.to));
            directed.add_edge(a, b, ());
            if edge.from != edge.to && neighbors[edge.from].insert(edge.to) {
                neighbors[edge.to].insert(edge.from);
                undirected.add_edge(a, b, ());
            }
        }

        Self { directed, undirected, neighbors }
    }

    pub fn len(&self) -> usize {
        self.directed.node_count()
    }

    pub fn successors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.directed
            .neighbors_directed(NodeIndex::new(i), Direction::Outgoing)
            .map(|n| n.index())
    }

    pub fn predecessors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.directed
            .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
            .map(|n| n.index())
    }

    /// In-degree plus out-degree; a self-loop counts twice.
    pub fn degree(&self, i: usize) -> usize {
        let node = NodeIndex::new(i);
        self.directed.edges_directed(node, Direction::Outgoing).count()
            + self.directed.edges_directed(node, Direction::Incoming).count()
    }

    pub fn undirected_edge_count(&self) -> usize {
        self.undirected.edge_count()
    }
}
