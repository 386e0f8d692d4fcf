//! HTML visualization command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use kgraph_analytics::{AdvancedMetrics, AnalyticsBridge};
use kgraph_viz::{RenderConfig, VisualizationBridge};

use super::Session;
use crate::output;

#[derive(Args)]
pub struct VisualizeArgs {
    /// Graph to render
    pub graph_id: String,

    /// Renderer: simple, interactive, enhanced or default
    #[arg(long = "type", default_value = "default")]
    pub viz_type: String,

    /// Output file (defaults to <GRAPH_ID>.html)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Page title
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Freeze the layout instead of simulating forces
    #[arg(long)]
    pub no_physics: bool,

    /// Leave inferred relations out
    #[arg(long)]
    pub hide_inferred: bool,

    /// Keep only the N most connected nodes (0 keeps all)
    #[arg(long)]
    pub max_nodes: Option<usize>,

    /// Compute analytics and overlay them (communities, central nodes)
    #[arg(long)]
    pub with_analytics: bool,
}

impl VisualizeArgs {
    fn render_config(&self) -> RenderConfig {
        let defaults = RenderConfig::default();
        RenderConfig {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| format!("{} - {}", defaults.title, self.graph_id)),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            physics: !self.no_physics,
            show_inferred: !self.hide_inferred,
            max_nodes: self.max_nodes.unwrap_or(defaults.max_nodes),
            color_by_type: defaults.color_by_type,
        }
    }
}

pub async fn execute(session: &Session, args: VisualizeArgs) -> Result<()> {
    let config = args.render_config();
    let metrics =
        if args.with_analytics { analytics(session, &args.graph_id).await? } else { None };

    let bridge =
        VisualizationBridge::new(session.store.clone()).context("Failed to load templates")?;
    let rendered = bridge
        .generate_visualization(
            &session.tenant,
            &args.graph_id,
            &args.viz_type,
            &config,
            metrics.as_ref(),
        )
        .await?;

    let path = args.output.unwrap_or_else(|| PathBuf::from(format!("{}.html", args.graph_id)));
    std::fs::write(&path, &rendered.html)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if session.json {
        return output::print_json(&serde_json::json!({
            "path": path,
            "statistics": rendered.statistics,
        }));
    }
    output::print_visualization(&path.display().to_string(), &rendered.statistics);
    Ok(())
}

/// Metrics for the overlay; unavailable analytics render without one.
async fn analytics(session: &Session, graph_id: &str) -> Result<Option<AdvancedMetrics>> {
    let bridge = AnalyticsBridge::new(session.store.clone());
    let all: [&str; 0] = [];
    let response = bridge.compute_advanced_metrics(&session.tenant, graph_id, &all).await?;
    if let Some(error) = response.error() {
        warn!(graph_id, error, "Rendering without analytics");
    }
    Ok(response.into_metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: VisualizeArgs,
    }

    #[test]
    fn flags_map_onto_render_config() {
        let harness =
            Harness::parse_from(["t", "g1", "--no-physics", "--hide-inferred", "--max-nodes", "0"]);
        let config = harness.args.render_config();
        assert!(!config.physics);
        assert!(!config.show_inferred);
        assert_eq!(config.max_nodes, 0);
        assert_eq!(config.width, RenderConfig::default().width);
        assert!(config.title.ends_with("g1"));
    }
}
