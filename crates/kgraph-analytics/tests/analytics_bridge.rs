//! Analytics bridge over the in-memory hybrid backend.

use std::sync::Arc;
use std::time::Duration;

use kgraph_analytics::{
    AlgorithmOutput, AlgorithmProvider, AlgorithmSet, AnalyticsBridge, AttributedGraph, CancelFlag,
    DisabledAlgorithms,
};
use kgraph_core::{keys, EntityPatch, GraphDatabaseConfig, KgError, KgResult, RawTriple};
use kgraph_store::{GraphDatabaseRegistry, KnowledgeGraphStore};

async fn store_with(config: GraphDatabaseConfig) -> Arc<KnowledgeGraphStore> {
    let registry = GraphDatabaseRegistry::connect(config).await.unwrap();
    Arc::new(KnowledgeGraphStore::new(Arc::new(registry)))
}

async fn store() -> Arc<KnowledgeGraphStore> {
    store_with(GraphDatabaseConfig::in_memory()).await
}

fn hub_and_spokes() -> Vec<RawTriple> {
    vec![
        RawTriple::new("Hub", "links", "A"),
        RawTriple::new("Hub", "links", "B"),
        RawTriple::new("Hub", "links", "C"),
        RawTriple::new("A", "links", "B"),
    ]
}

/// Spins until cancelled.
struct SlowAlgorithms;

impl AlgorithmProvider for SlowAlgorithms {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn available(&self) -> bool {
        true
    }

    fn compute(
        &self,
        _: &AttributedGraph,
        _: &AlgorithmSet,
        cancel: &CancelFlag,
    ) -> KgResult<AlgorithmOutput> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(KgError::AnalyticsUnavailable("cancelled".into()))
    }
}

#[tokio::test]
async fn centrality_on_an_empty_graph_is_well_defined() {
    let bridge = AnalyticsBridge::new(store().await);
    let response = bridge.compute_advanced_metrics("t1", "empty", &["centrality"]).await.unwrap();

    let metrics = response.metrics().unwrap();
    assert_eq!(metrics.node_count, 0);
    assert_eq!(metrics.edge_count, 0);
    let centrality = metrics.centrality.as_ref().unwrap();
    assert!(centrality.degree.as_ref().unwrap().is_empty());
    assert!(centrality.betweenness.as_ref().unwrap().is_empty());
    assert!(centrality.closeness.as_ref().unwrap().is_empty());
    assert!(centrality.eigenvector.as_ref().unwrap().is_empty());
    assert!(metrics.paths.is_none());
}

#[tokio::test]
async fn full_metrics_for_a_small_graph() {
    let store = store().await;
    store.save_knowledge_graph("t1", "g", &hub_and_spokes()).await.unwrap();
    let bridge = AnalyticsBridge::new(store);

    let empty: [&str; 0] = [];
    let response = bridge.compute_advanced_metrics("t1", "g", &empty).await.unwrap();
    let metrics = response.into_metrics().unwrap();

    assert_eq!(metrics.node_count, 4);
    assert_eq!(metrics.edge_count, 4);
    assert_eq!(metrics.algorithms.len(), 7);
    let top = metrics.centrality.as_ref().unwrap().top_by_degree(1);
    assert_eq!(top[0].0, keys::entity_key("Hub"));
    assert_eq!(metrics.display_name(&top[0].0), "Hub");
    assert_eq!(top[0].1, 1.0);

    let paths = metrics.paths.as_ref().unwrap();
    assert!(paths.connected);
    assert_eq!(paths.diameter, Some(2));
    let clustering = metrics.clustering.as_ref().unwrap();
    assert!(clustering.transitivity > 0.0);
    let communities = metrics.communities.as_ref().unwrap();
    let members: usize = communities.communities.iter().map(Vec::len).sum();
    assert_eq!(members, 4);
}

#[tokio::test]
async fn renaming_onto_an_existing_name_keeps_entities_apart() {
    let store = store().await;
    store.save_knowledge_graph("t1", "g", &hub_and_spokes()).await.unwrap();
    let rename = EntityPatch { name: Some("A".into()), ..Default::default() };
    let edited = store.update_entity("t1", &keys::entity_key("C"), &rename).await.unwrap();
    assert!(edited.success);

    let bridge = AnalyticsBridge::new(store);
    let metrics = bridge
        .compute_advanced_metrics("t1", "g", &["degree", "communities"])
        .await
        .unwrap()
        .into_metrics()
        .unwrap();

    let degree = metrics.centrality.as_ref().unwrap().degree.as_ref().unwrap();
    assert_eq!(degree.len(), 4);
    let (a, c) = (keys::entity_key("A"), keys::entity_key("C"));
    assert!(degree[&a] > degree[&c]);
    assert_eq!(metrics.display_name(&a), "A");
    assert_eq!(metrics.display_name(&c), "A");

    let communities = &metrics.communities.as_ref().unwrap().communities;
    let members: usize = communities.iter().map(Vec::len).sum();
    assert_eq!(members, 4);
}

#[tokio::test]
async fn parallel_relations_merge_in_the_export() {
    let store = store().await;
    let triples = vec![
        RawTriple::new("Alice", "knows", "Bob").with_confidence(0.3),
        RawTriple::new("Alice", "mentors", "Bob").with_confidence(0.8),
    ];
    store.save_knowledge_graph("t1", "g", &triples).await.unwrap();
    let bridge = AnalyticsBridge::new(store);

    let graph = bridge.export_attributed_graph("t1", "g").await.unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.edges[0].multiplicity, 2);
    assert_eq!(graph.edges[0].confidence, 0.8);
}

#[tokio::test]
async fn results_are_cached_until_the_graph_changes() {
    let store = store().await;
    store.save_knowledge_graph("t1", "g", &hub_and_spokes()).await.unwrap();
    let bridge = AnalyticsBridge::new(store.clone());

    let first = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert!(!first.metrics().unwrap().cached);
    let second = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert!(second.metrics().unwrap().cached);

    store
        .save_knowledge_graph("t1", "g", &[RawTriple::new("C", "links", "D")])
        .await
        .unwrap();
    let after_save = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    let metrics = after_save.metrics().unwrap();
    assert!(!metrics.cached);
    assert_eq!(metrics.node_count, 5);

    store.delete_knowledge_graph("t1", "g").await.unwrap();
    let after_delete = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    let metrics = after_delete.metrics().unwrap();
    assert!(!metrics.cached);
    assert_eq!(metrics.node_count, 0);
}

#[tokio::test]
async fn other_graphs_keep_their_cache_entries() {
    let store = store().await;
    store.save_knowledge_graph("t1", "a", &hub_and_spokes()).await.unwrap();
    store.save_knowledge_graph("t1", "b", &hub_and_spokes()).await.unwrap();
    let bridge = AnalyticsBridge::new(store.clone());

    bridge.compute_advanced_metrics("t1", "a", &["paths"]).await.unwrap();
    store.save_knowledge_graph("t1", "b", &[RawTriple::new("X", "p", "Y")]).await.unwrap();

    let again = bridge.compute_advanced_metrics("t1", "a", &["paths"]).await.unwrap();
    assert!(again.metrics().unwrap().cached);
}

#[tokio::test]
async fn entity_edits_invalidate_the_tenant() {
    let store = store().await;
    store.save_knowledge_graph("t1", "g", &hub_and_spokes()).await.unwrap();
    let bridge = AnalyticsBridge::new(store.clone());
    bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();

    let patch = EntityPatch { entity_type: Some("router".into()), ..Default::default() };
    store.update_entity("t1", &keys::entity_key("Hub"), &patch).await.unwrap();

    let response = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert!(!response.metrics().unwrap().cached);
}

#[tokio::test]
async fn backend_switch_clears_the_cache() {
    let store = store().await;
    store.save_knowledge_graph("t1", "g", &hub_and_spokes()).await.unwrap();
    let bridge = AnalyticsBridge::new(store.clone());
    bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert_eq!(bridge.cache().len(), 1);

    store.registry().switch_backend(GraphDatabaseConfig::in_memory()).await.unwrap();

    let response = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    let metrics = response.metrics().unwrap();
    assert!(!metrics.cached);
    // The new in-memory backend starts empty.
    assert_eq!(metrics.node_count, 0);
}

#[tokio::test]
async fn missing_algorithms_degrade_to_an_error_payload() {
    let bridge = AnalyticsBridge::with_provider(store().await, Arc::new(DisabledAlgorithms));
    assert!(!bridge.is_available());

    let response = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert!(response.error().is_some());
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn disabled_analytics_degrades_to_an_error_payload() {
    let mut config = GraphDatabaseConfig::in_memory();
    config.performance.enable_analytics = false;
    let bridge = AnalyticsBridge::new(store_with(config).await);

    let response = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert!(response.error().is_some());
}

#[tokio::test]
async fn unknown_algorithm_degrades_to_an_error_payload() {
    let bridge = AnalyticsBridge::new(store().await);
    let response = bridge.compute_advanced_metrics("t1", "g", &["pagerank"]).await.unwrap();
    assert!(response.error().unwrap().contains("pagerank"));
}

#[tokio::test]
async fn slow_computation_times_out_and_is_not_cached() {
    let mut config = GraphDatabaseConfig::in_memory();
    config.performance.query_timeout = 1;
    let store = store_with(config).await;
    store.save_knowledge_graph("t1", "g", &hub_and_spokes()).await.unwrap();
    let bridge = AnalyticsBridge::with_provider(store, Arc::new(SlowAlgorithms));

    let response = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap();
    assert!(response.error().unwrap().contains("timed out"));
    assert!(bridge.cache().is_empty());
}

#[tokio::test]
async fn fatal_backend_errors_still_propagate() {
    let store = store().await;
    let bridge = AnalyticsBridge::new(store.clone());
    store.registry().shutdown().await.unwrap();

    let err = bridge.compute_advanced_metrics("t1", "g", &["degree"]).await.unwrap_err();
    assert!(err.is_fatal());
}
