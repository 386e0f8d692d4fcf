//! Full-graph load, bounded traversal and statistics over any adapter.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use kgraph_core::{keys, KgResult, PartitionHandle, TripleRecord};

use crate::adapter::{GraphBackendAdapter, GraphCounts};

/// Size and shape of one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub graph_id: String,
    pub entities: usize,
    pub relations: usize,
    pub density: f64,
    pub avg_degree: f64,
}

impl GraphStatistics {
    /// `density = r / (n(n-1))`, zero for `n <= 1`;
    /// `avg_degree = 2r / n`, zero for `n = 0`.
    pub fn from_counts(graph_id: &str, counts: GraphCounts) -> Self {
        let n = counts.entities as f64;
        let r = counts.relations as f64;
        let density = if counts.entities <= 1 { 0.0 } else { r / (n * (n - 1.0)) };
        let avg_degree = if counts.entities == 0 { 0.0 } else { 2.0 * r / n };
        Self {
            graph_id: graph_id.to_string(),
            entities: counts.entities,
            relations: counts.relations,
            density,
            avg_degree,
        }
    }
}

pub struct GraphQueryEngine {
    adapter: Arc<dyn GraphBackendAdapter>,
}

impl GraphQueryEngine {
    pub fn new(adapter: Arc<dyn GraphBackendAdapter>) -> Self {
        Self { adapter }
    }

    /// Every relation of `graph_id`, endpoints resolved to names. A graph
    /// that does not exist is empty.
    pub async fn load_graph(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<Vec<TripleRecord>> {
        self.adapter.graph_triples(partition, graph_id).await
    }

    /// Breadth-first expansion along outbound relations from the entity named
    /// `center`.
    ///
    /// Returns at most `limit` rows and never a node more than `depth` hops
    /// from the center. Within one hop rows follow the adapter's
    /// `(subject, predicate, object)` order, so the result is deterministic.
    pub async fn subgraph(
        &self,
        partition: &PartitionHandle,
        center: &str,
        depth: usize,
        limit: usize,
        graph_id: Option<&str>,
    ) -> KgResult<Vec<TripleRecord>> {
        if center.trim().is_empty() || depth == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let center_key = keys::entity_key(center);
        let mut visited: HashSet<String> = HashSet::from([center_key.clone()]);
        let mut frontier = vec![center_key];
        let mut rows: Vec<TripleRecord> = Vec::new();

        for hop in 1..=depth {
            let remaining = limit - rows.len();
            let found =
                self.adapter.outbound_triples(partition, &frontier, graph_id, remaining).await?;

            let mut next = Vec::new();
            for row in found.into_iter().take(remaining) {
                if visited.insert(row.object_key.clone()) {
                    next.push(row.object_key.clone());
                }
                rows.push(row);
            }
            debug!(hop, frontier = frontier.len(), rows = rows.len(), "Expanded subgraph hop");

            if rows.len() >= limit || next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(rows)
    }

    pub async fn statistics(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<GraphStatistics> {
        let counts = self.adapter.graph_counts(partition, graph_id).await?;
        Ok(GraphStatistics::from_counts(graph_id, counts))
    }
}
