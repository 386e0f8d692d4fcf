//! KGraph Analytics
//!
//! Exports a tenant's graph into an in-memory attributed graph and computes
//! graph-algorithm metrics on a bounded worker pool, caching the results
//! until the graph changes.

pub mod algorithms;
pub mod attributed;
pub mod bridge;
pub mod cache;
pub mod metrics;
pub mod pool;

pub use algorithms::{
    default_provider, Algorithm, AlgorithmOutput, AlgorithmProvider, AlgorithmSet, CentralityScores,
    ClusteringResult, CommunityResult, DisabledAlgorithms, PathResult,
};
#[cfg(feature = "algorithms")]
pub use algorithms::PetgraphAlgorithms;
pub use attributed::{AttributedEdge, AttributedGraph, AttributedNode};
pub use bridge::AnalyticsBridge;
pub use cache::{CacheKey, Epoch, MetricsCache};
pub use metrics::{AdvancedMetrics, AnalyticsResponse};
pub use pool::{CancelFlag, WorkerPool};
