//! Interactive page with an analytics side panel.
//!
//! With metrics, nodes are coloured by community, sized by degree
//! centrality and the most central ones are listed and outlined. Without
//! metrics it renders like the interactive page plus an empty panel.

use std::sync::Arc;

use serde::Serialize;
use tera::Tera;

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::TripleRecord;

use super::interactive::canvas_context;
use super::{RenderOutput, RenderStrategy};
use crate::config::RenderConfig;
use crate::error::VizResult;
use crate::payload::{GraphPayload, PALETTE};
use crate::statistics::VisualizationStatistics;

const TOP_NODES: usize = 10;
const LISTED_COMMUNITIES: usize = 12;

#[derive(Serialize)]
struct Leader {
    name: String,
    score: f64,
}

#[derive(Serialize)]
struct CommunityLegend<'a> {
    color: &'a str,
    members: Vec<&'a str>,
}

pub struct EnhancedStrategy {
    tera: Arc<Tera>,
}

impl EnhancedStrategy {
    pub fn new(tera: Arc<Tera>) -> Self {
        Self { tera }
    }
}

impl RenderStrategy for EnhancedStrategy {
    fn name(&self) -> &'static str {
        "enhanced"
    }

    fn render(
        &self,
        triples: &[TripleRecord],
        config: &RenderConfig,
        metrics: Option<&AdvancedMetrics>,
    ) -> VizResult<RenderOutput> {
        let statistics = VisualizationStatistics::from_triples(triples);
        let mut payload = GraphPayload::build(triples, config);
        if let Some(metrics) = metrics {
            payload.apply_metrics(metrics, TOP_NODES);
        }

        let mut context = canvas_context(&payload, config, &statistics)?;
        context.insert("has_metrics", &metrics.is_some());

        let leaders: Vec<Leader> = metrics
            .and_then(|m| Some((m, m.centrality.as_ref()?)))
            .map(|(m, c)| {
                c.top_by_degree(TOP_NODES)
                    .into_iter()
                    .map(|(key, score)| Leader { name: m.display_name(&key).to_string(), score })
                    .collect()
            })
            .unwrap_or_default();
        context.insert("leaders", &leaders);

        let communities = metrics.and_then(|m| Some((m, m.communities.as_ref()?)));
        let legend: Vec<CommunityLegend<'_>> = communities
            .map(|(m, c)| {
                c.communities
                    .iter()
                    .take(LISTED_COMMUNITIES)
                    .enumerate()
                    .map(|(i, members)| CommunityLegend {
                        color: PALETTE[i % PALETTE.len()],
                        members: members.iter().map(|key| m.display_name(key)).collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        context.insert("communities", &legend);
        context.insert("modularity", &communities.map(|(_, c)| c.modularity).unwrap_or(0.0));

        let html = self.tera.render("enhanced.html", &context)?;
        Ok(RenderOutput { html, statistics })
    }
}
