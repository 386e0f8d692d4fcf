//! Analytics result shapes returned to callers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithms::{
    AlgorithmOutput, CentralityScores, ClusteringResult, CommunityResult, PathResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub graph_id: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub algorithms: Vec<String>,
    pub computed_at: DateTime<Utc>,
    /// Served from the cache rather than computed for this call.
    #[serde(default)]
    pub cached: bool,
    /// Entity key to display name. Every other section is keyed by entity
    /// key, so entities that share a name stay apart.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub names: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centrality: Option<CentralityScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communities: Option<CommunityResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clustering: Option<ClusteringResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathResult>,
}

impl AdvancedMetrics {
    pub fn new(
        graph_id: &str,
        node_count: usize,
        edge_count: usize,
        algorithms: Vec<String>,
        output: AlgorithmOutput,
    ) -> Self {
        Self {
            graph_id: graph_id.to_string(),
            node_count,
            edge_count,
            algorithms,
            computed_at: Utc::now(),
            cached: false,
            names: output.names,
            centrality: output.centrality,
            communities: output.communities,
            clustering: output.clustering,
            paths: output.paths,
        }
    }
}

impl AdvancedMetrics {
    /// Display name for an entity key, or the key itself when unknown.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.names.get(key).map_or(key, String::as_str)
    }
}

/// Best-effort analytics answer: metrics, or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyticsResponse {
    Metrics(Box<AdvancedMetrics>),
    Unavailable { error: String },
}

impl AnalyticsResponse {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::Unavailable { error: error.into() }
    }

    pub fn metrics(&self) -> Option<&AdvancedMetrics> {
        match self {
            Self::Metrics(m) => Some(m),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn into_metrics(self) -> Option<AdvancedMetrics> {
        match self {
            Self::Metrics(m) => Some(*m),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Metrics(_) => None,
            Self::Unavailable { error } => Some(error),
        }
    }
}

impl From<AdvancedMetrics> for AnalyticsResponse {
    fn from(metrics: AdvancedMetrics) -> Self {
        Self::Metrics(Box::new(metrics))
    }
}
