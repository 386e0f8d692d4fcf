//! Static SVG with a circular layout computed up front. No script.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::Arc;

use serde::Serialize;
use tera::{Context, Tera};

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::TripleRecord;

use super::{RenderOutput, RenderStrategy};
use crate::config::RenderConfig;
use crate::error::VizResult;
use crate::payload::GraphPayload;
use crate::statistics::VisualizationStatistics;

const MARGIN: f64 = 60.0;

#[derive(Serialize)]
struct PlacedNode<'a> {
    label: &'a str,
    group: &'a str,
    color: &'a str,
    x: f64,
    y: f64,
    r: f64,
    label_y: f64,
}

#[derive(Serialize)]
struct PlacedEdge<'a> {
    label: &'a str,
    inferred: bool,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub struct SimpleStrategy {
    tera: Arc<Tera>,
}

impl SimpleStrategy {
    pub fn new(tera: Arc<Tera>) -> Self {
        Self { tera }
    }
}

impl RenderStrategy for SimpleStrategy {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn render(
        &self,
        triples: &[TripleRecord],
        config: &RenderConfig,
        _metrics: Option<&AdvancedMetrics>,
    ) -> VizResult<RenderOutput> {
        let statistics = VisualizationStatistics::from_triples(triples);
        let payload = GraphPayload::build(triples, config);

        let (w, h) = (f64::from(config.width), f64::from(config.height));
        let (cx, cy) = (w / 2.0, h / 2.0);
        let radius = (w.min(h) / 2.0 - MARGIN).max(10.0);
        let count = payload.nodes.len();

        let mut position: HashMap<&str, (f64, f64, f64)> = HashMap::new();
        let nodes: Vec<PlacedNode<'_>> = payload
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let (x, y) = if count == 1 {
                    (cx, cy)
                } else {
                    let angle = TAU * i as f64 / count as f64;
                    (cx + radius * angle.cos(), cy + radius * angle.sin())
                };
                let r = n.size / 2.0;
                position.insert(n.id.as_str(), (x, y, r));
                PlacedNode {
                    label: &n.label,
                    group: &n.group,
                    color: &n.color,
                    x: round1(x),
                    y: round1(y),
                    r: round1(r),
                    label_y: round1(y - r - 4.0),
                }
            })
            .collect();

        let edges: Vec<PlacedEdge<'_>> = payload
            .edges
            .iter()
            .filter_map(|e| {
                let &(x1, y1, _) = position.get(e.from.as_str())?;
                let &(x2, y2, r) = position.get(e.to.as_str())?;
                // Stop the arrow at the target's rim.
                let (dx, dy) = (x2 - x1, y2 - y1);
                let len = dx.hypot(dy).max(1e-6);
                Some(PlacedEdge {
                    label: &e.label,
                    inferred: e.inferred,
                    x1: round1(x1),
                    y1: round1(y1),
                    x2: round1(x2 - dx / len * r),
                    y2: round1(y2 - dy / len * r),
                })
            })
            .collect();

        let mut context = Context::new();
        context.insert("title", &config.title);
        context.insert("width", &config.width);
        context.insert("height", &config.height);
        context.insert("statistics", &statistics);
        context.insert("truncated", &payload.truncated);
        context.insert("shown", &count);
        context.insert("nodes", &nodes);
        context.insert("edges", &edges);

        let html = self.tera.render("simple.html", &context)?;
        Ok(RenderOutput { html, statistics })
    }
}
