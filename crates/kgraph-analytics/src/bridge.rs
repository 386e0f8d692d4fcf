//! Analytics over persisted graphs.
//!
//! The bridge exports a graph through the store, runs the requested
//! algorithms on the worker pool and caches the result per
//! `(tenant, graph, algorithm set)`. Store mutation events invalidate the
//! cache; they are drained before every lookup.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

use kgraph_core::{KgError, KgResult};
use kgraph_store::{EventReceiver, GraphEvent, KnowledgeGraphStore};

use crate::algorithms::{default_provider, AlgorithmProvider, AlgorithmSet};
use crate::attributed::AttributedGraph;
use crate::cache::{CacheKey, MetricsCache};
use crate::metrics::{AdvancedMetrics, AnalyticsResponse};
use crate::pool::WorkerPool;

pub struct AnalyticsBridge {
    store: Arc<KnowledgeGraphStore>,
    provider: Arc<dyn AlgorithmProvider>,
    pool: WorkerPool,
    cache: MetricsCache,
    events: Mutex<EventReceiver>,
    enabled: bool,
}

impl AnalyticsBridge {
    /// Bridge configured from the store's performance settings, using the
    /// best algorithm provider compiled in.
    pub fn new(store: Arc<KnowledgeGraphStore>) -> Self {
        Self::with_provider(store, default_provider())
    }

    pub fn with_provider(
        store: Arc<KnowledgeGraphStore>,
        provider: Arc<dyn AlgorithmProvider>,
    ) -> Self {
        let config = store.registry().config();
        let performance = &config.performance;
        let cache = if performance.cache {
            MetricsCache::new(performance.cache_ttl(), performance.max_cache_size)
        } else {
            MetricsCache::disabled()
        };
        let events = Mutex::new(store.subscribe());

        Self {
            pool: WorkerPool::new(performance.analytics_workers, performance.query_timeout()),
            cache,
            events,
            enabled: performance.enable_analytics,
            provider,
            store,
        }
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn is_available(&self) -> bool {
        self.enabled && self.provider.available()
    }

    /// Attributed in-memory view of one graph.
    pub async fn export_attributed_graph(
        &self,
        tenant_id: &str,
        graph_id: &str,
    ) -> KgResult<AttributedGraph> {
        let triples = self.store.export_triples(tenant_id, graph_id).await?;
        Ok(AttributedGraph::from_triples(graph_id, &triples))
    }

    /// Compute `algorithms` over a graph.
    ///
    /// Never fails for analytics reasons: a missing provider, an unknown
    /// algorithm name, a timeout or a non-fatal storage error all come back
    /// as [`AnalyticsResponse::Unavailable`]. Only fatal backend errors are
    /// returned as `Err`.
    pub async fn compute_advanced_metrics<S: AsRef<str>>(
        &self,
        tenant_id: &str,
        graph_id: &str,
        algorithms: &[S],
    ) -> KgResult<AnalyticsResponse> {
        self.drain_events();

        if !self.enabled {
            return Ok(AnalyticsResponse::unavailable("analytics is disabled"));
        }
        if !self.provider.available() {
            warn!(provider = self.provider.name(), "Graph algorithms are not available");
            return Ok(AnalyticsResponse::unavailable("graph algorithms are not installed"));
        }
        let set = match AlgorithmSet::parse(algorithms) {
            Ok(set) => set,
            Err(e) => return Ok(AnalyticsResponse::unavailable(e.to_string())),
        };

        let key = CacheKey::new(tenant_id, graph_id, &set.key());
        if let Some(mut metrics) = self.cache.get(&key) {
            debug!(tenant_id, graph_id, algorithms = %key.algorithms, "Analytics cache hit");
            metrics.cached = true;
            return Ok(metrics.into());
        }
        let epoch = self.cache.epoch(tenant_id, graph_id);

        let graph = match self.export_attributed_graph(tenant_id, graph_id).await {
            Ok(graph) => graph,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(tenant_id, graph_id, error = %e, "Could not export graph for analytics");
                return Ok(AnalyticsResponse::unavailable(e.to_string()));
            }
        };
        let (node_count, edge_count) = (graph.node_count(), graph.edge_count());

        let provider = self.provider.clone();
        let job_set = set.clone();
        let computed =
            self.pool.run(move |cancel| provider.compute(&graph, &job_set, cancel)).await;

        let output = match computed {
            Ok(output) => output,
            Err(KgError::Timeout(after)) => {
                return Ok(AnalyticsResponse::unavailable(format!(
                    "analytics timed out after {}s",
                    after.as_secs_f64()
                )));
            }
            Err(e) => {
                warn!(tenant_id, graph_id, error = %e, "Analytics computation failed");
                return Ok(AnalyticsResponse::unavailable(e.to_string()));
            }
        };

        let metrics = AdvancedMetrics::new(graph_id, node_count, edge_count, set.names(), output);
        // Pick up mutations that happened while computing before storing.
        self.drain_events();
        self.cache.insert(key, metrics.clone(), epoch);
        info!(
            tenant_id,
            graph_id,
            nodes = node_count,
            edges = edge_count,
            "Computed graph analytics"
        );
        Ok(metrics.into())
    }

    /// Apply pending store events to the cache.
    fn drain_events(&self) {
        let mut events = self.events.lock();
        loop {
            match events.try_recv() {
                Ok(event) => self.apply(&event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Missed graph events; clearing analytics cache");
                    self.cache.clear();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn apply(&self, event: &GraphEvent) {
        match event {
            GraphEvent::GraphSaved { tenant_id, graph_id }
            | GraphEvent::GraphUpdated { tenant_id, graph_id }
            | GraphEvent::GraphDeleted { tenant_id, graph_id } => {
                self.cache.invalidate_graph(tenant_id, graph_id)
            }
            GraphEvent::EntityEdited { tenant_id } => self.cache.invalidate_tenant(tenant_id),
            GraphEvent::BackendSwitched => self.cache.clear(),
        }
    }
}
