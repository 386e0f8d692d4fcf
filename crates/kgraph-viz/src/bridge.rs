//! Visualization entry point used by the API layer.

use std::sync::Arc;

use tracing::info;

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::TripleRecord;
use kgraph_store::KnowledgeGraphStore;

use crate::config::RenderConfig;
use crate::error::VizResult;
use crate::strategies::{RenderOutput, StrategyTable};

pub struct VisualizationBridge {
    store: Arc<KnowledgeGraphStore>,
    strategies: StrategyTable,
}

impl VisualizationBridge {
    pub fn new(store: Arc<KnowledgeGraphStore>) -> VizResult<Self> {
        Ok(Self { store, strategies: StrategyTable::new()? })
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Load a graph and render it with the strategy named `viz_type`.
    /// Unknown names use the default strategy.
    pub async fn generate_visualization(
        &self,
        tenant_id: &str,
        graph_id: &str,
        viz_type: &str,
        config: &RenderConfig,
        metrics: Option<&AdvancedMetrics>,
    ) -> VizResult<RenderOutput> {
        let triples = self.store.export_triples(tenant_id, graph_id).await?;
        let output = self.render_triples(&triples, viz_type, config, metrics)?;
        info!(
            tenant_id,
            graph_id,
            viz_type,
            nodes = output.statistics.nodes,
            edges = output.statistics.edges,
            "Rendered visualization"
        );
        Ok(output)
    }

    /// Render triples already in hand.
    pub fn render_triples(
        &self,
        triples: &[TripleRecord],
        viz_type: &str,
        config: &RenderConfig,
        metrics: Option<&AdvancedMetrics>,
    ) -> VizResult<RenderOutput> {
        self.strategies.select(viz_type).render(triples, config, metrics)
    }
}
