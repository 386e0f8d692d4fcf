//! Cheap counts over a triple set, computed without analytics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use kgraph_core::TripleRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationStatistics {
    pub nodes: usize,
    pub edges: usize,
    pub inferred_edges: usize,
    pub original_edges: usize,
    /// `edges / (nodes * (nodes - 1))`, 0 below two nodes.
    pub density: f64,
}

impl VisualizationStatistics {
    pub fn from_triples(triples: &[TripleRecord]) -> Self {
        let nodes: HashSet<&str> = triples
            .iter()
            .flat_map(|t| [t.subject_key.as_str(), t.object_key.as_str()])
            .collect();
        let nodes = nodes.len();
        let edges = triples.len();
        let inferred_edges = triples.iter().filter(|t| t.inferred).count();
        let density = if nodes > 1 { edges as f64 / (nodes * (nodes - 1)) as f64 } else { 0.0 };

        Self { nodes, edges, inferred_edges, original_edges: edges - inferred_edges, density }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::fixtures::triple;

    #[test]
    fn counts_inferred_and_original_edges() {
        let triples = vec![
            triple("Alice", "knows", "Bob", false),
            triple("Bob", "knows", "Carol", true),
            triple("Alice", "likes", "Bob", false),
        ];
        let stats = VisualizationStatistics::from_triples(&triples);
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 3);
        assert_eq!(stats.inferred_edges, 1);
        assert_eq!(stats.original_edges, 2);
        assert_eq!(stats.density, 0.5);
    }

    #[test]
    fn empty_set_has_zero_density() {
        let stats = VisualizationStatistics::from_triples(&[]);
        assert_eq!(stats, VisualizationStatistics::default());
    }
}
