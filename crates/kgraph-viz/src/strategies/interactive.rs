//! Canvas page with an in-browser force layout.

use std::sync::Arc;

use tera::{Context, Tera};

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::TripleRecord;

use super::{RenderOutput, RenderStrategy};
use crate::config::RenderConfig;
use crate::error::VizResult;
use crate::payload::GraphPayload;
use crate::statistics::VisualizationStatistics;

pub struct InteractiveStrategy {
    tera: Arc<Tera>,
}

impl InteractiveStrategy {
    pub fn new(tera: Arc<Tera>) -> Self {
        Self { tera }
    }
}

/// Context shared by the canvas-based pages.
pub(super) fn canvas_context(
    payload: &GraphPayload,
    config: &RenderConfig,
    statistics: &VisualizationStatistics,
) -> VizResult<Context> {
    let mut context = Context::new();
    context.insert("title", &config.title);
    context.insert("width", &config.width);
    context.insert("height", &config.height);
    context.insert("physics", &config.physics);
    context.insert("statistics", statistics);
    context.insert("truncated", &payload.truncated);
    context.insert("shown", &payload.nodes.len());
    context.insert("graph_json", &payload.to_script_json()?);
    Ok(context)
}

impl RenderStrategy for InteractiveStrategy {
    fn name(&self) -> &'static str {
        "interactive"
    }

    fn render(
        &self,
        triples: &[TripleRecord],
        config: &RenderConfig,
        _metrics: Option<&AdvancedMetrics>,
    ) -> VizResult<RenderOutput> {
        let statistics = VisualizationStatistics::from_triples(triples);
        let payload = GraphPayload::build(triples, config);
        let context = canvas_context(&payload, config, &statistics)?;
        let html = self.tera.render("interactive.html", &context)?;
        Ok(RenderOutput { html, statistics })
    }
}
