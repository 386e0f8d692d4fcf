//! Rendering stored graphs through every strategy.

use std::sync::Arc;

use kgraph_analytics::AnalyticsBridge;
use kgraph_core::{GraphDatabaseConfig, RawTriple};
use kgraph_store::{GraphDatabaseRegistry, KnowledgeGraphStore};
use kgraph_viz::{RenderConfig, VisualizationBridge};

async fn store() -> Arc<KnowledgeGraphStore> {
    let registry = GraphDatabaseRegistry::connect(GraphDatabaseConfig::in_memory()).await.unwrap();
    let store = Arc::new(KnowledgeGraphStore::new(Arc::new(registry)));
    let triples = vec![
        RawTriple::new("Alice", "works_at", "Acme").with_confidence(0.9),
        RawTriple::new("Bob", "works_at", "Acme"),
        RawTriple::new("Alice", "knows", "Bob").inferred(),
    ];
    store.save_knowledge_graph("t1", "g1", &triples).await.unwrap();
    store
}

#[tokio::test]
async fn every_strategy_renders_html_with_statistics() {
    let bridge = VisualizationBridge::new(store().await).unwrap();
    let config = RenderConfig::default().with_title("Staff");

    for viz_type in ["simple", "interactive", "enhanced", "default"] {
        let output = bridge
            .generate_visualization("t1", "g1", viz_type, &config, None)
            .await
            .unwrap();
        assert!(output.html.starts_with("<!DOCTYPE html>"), "{viz_type}");
        assert!(output.html.contains("<title>Staff</title>"), "{viz_type}");
        assert!(output.html.contains("Alice"), "{viz_type}");
        assert_eq!(output.statistics.nodes, 3);
        assert_eq!(output.statistics.edges, 3);
        assert_eq!(output.statistics.inferred_edges, 1);
        assert_eq!(output.statistics.original_edges, 2);
        assert_eq!(output.statistics.density, 0.5);
    }
}

#[tokio::test]
async fn unknown_type_falls_back_to_default() {
    let bridge = VisualizationBridge::new(store().await).unwrap();
    let config = RenderConfig::default();
    let fallback =
        bridge.generate_visualization("t1", "g1", "hologram", &config, None).await.unwrap();
    let default =
        bridge.generate_visualization("t1", "g1", "default", &config, None).await.unwrap();
    assert_eq!(fallback.html, default.html);
}

#[tokio::test]
async fn simple_page_is_static_svg() {
    let bridge = VisualizationBridge::new(store().await).unwrap();
    let output = bridge
        .generate_visualization("t1", "g1", "simple", &RenderConfig::default(), None)
        .await
        .unwrap();
    assert!(output.html.contains("<svg"));
    assert!(!output.html.contains("<script"));
    assert!(output.html.contains("class=\"edge inferred\""));
}

#[tokio::test]
async fn enhanced_page_lists_analytics_when_supplied() {
    let store = store().await;
    let analytics = AnalyticsBridge::new(store.clone());
    let bridge = VisualizationBridge::new(store).unwrap();

    let metrics = analytics
        .compute_advanced_metrics("t1", "g1", &["degree", "communities"])
        .await
        .unwrap()
        .into_metrics()
        .unwrap();
    let with = bridge
        .generate_visualization("t1", "g1", "enhanced", &RenderConfig::default(), Some(&metrics))
        .await
        .unwrap();
    assert!(with.html.contains("Most connected"));
    // Leaders are listed by display name, not entity key.
    assert!(with.html.contains("<li>Acme <span"));
    assert!(with.html.contains("Modularity"));

    let without = bridge
        .generate_visualization("t1", "g1", "enhanced", &RenderConfig::default(), None)
        .await
        .unwrap();
    assert!(without.html.contains("No analytics supplied"));
}

#[tokio::test]
async fn labels_are_escaped() {
    let store = store().await;
    store
        .save_knowledge_graph(
            "t1",
            "xss",
            &[RawTriple::new("<b>bold</b>", "p", "</script><script>x")],
        )
        .await
        .unwrap();
    let bridge = VisualizationBridge::new(store).unwrap();

    let simple = bridge
        .generate_visualization("t1", "xss", "simple", &RenderConfig::default(), None)
        .await
        .unwrap();
    assert!(!simple.html.contains("<b>bold</b>"));
    assert!(simple.html.contains("&lt;b&gt;bold"));

    let interactive = bridge
        .generate_visualization("t1", "xss", "interactive", &RenderConfig::default(), None)
        .await
        .unwrap();
    assert!(!interactive.html.contains("</script><script>x"));
}

#[tokio::test]
async fn empty_graph_renders_an_empty_page() {
    let bridge = VisualizationBridge::new(store().await).unwrap();
    let output = bridge
        .generate_visualization("t1", "missing", "interactive", &RenderConfig::default(), None)
        .await
        .unwrap();
    assert_eq!(output.statistics.nodes, 0);
    assert_eq!(output.statistics.density, 0.0);
    assert!(output.html.contains("\"nodes\":[]"));
}
