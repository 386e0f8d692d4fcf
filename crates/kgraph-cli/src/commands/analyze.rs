//! Graph analytics command.

use anyhow::{bail, Result};
use clap::Args;

use kgraph_analytics::{AnalyticsBridge, AnalyticsResponse};

use super::Session;
use crate::output;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Graph to analyse
    pub graph_id: String,

    /// Comma-separated algorithms (degree, betweenness, closeness,
    /// eigenvector, centrality, communities, clustering, paths, all)
    #[arg(short, long, value_delimiter = ',')]
    pub algorithms: Vec<String>,
}

pub async fn execute(session: &Session, args: AnalyzeArgs) -> Result<()> {
    let bridge = AnalyticsBridge::new(session.store.clone());
    let response = bridge
        .compute_advanced_metrics(&session.tenant, &args.graph_id, args.algorithms.as_slice())
        .await?;

    if session.json {
        return output::print_json(&response);
    }
    match response {
        AnalyticsResponse::Metrics(metrics) => {
            output::print_metrics(&metrics);
            Ok(())
        }
        AnalyticsResponse::Unavailable { error } => bail!("Analytics unavailable: {error}"),
    }
}
