//! Invariants of the computed metrics on arbitrary small graphs.

#![cfg(feature = "algorithms")]

use std::collections::BTreeSet;

use proptest::prelude::*;

use kgraph_analytics::{
    AlgorithmProvider, AlgorithmSet, AttributedGraph, CancelFlag, PetgraphAlgorithms,
};
use kgraph_core::{keys, TripleRecord};

fn record(from: usize, to: usize) -> TripleRecord {
    let (subject, object) = (format!("n{from}"), format!("n{to}"));
    let (subject_key, object_key) = (keys::entity_key(&subject), keys::entity_key(&object));
    TripleRecord {
        key: keys::relation_key(&subject_key, "next", &object_key),
        graph_id: "g".into(),
        subject_key,
        subject,
        subject_type: "entity".into(),
        predicate: "next".into(),
        object_key,
        object,
        object_type: "entity".into(),
        confidence: 1.0,
        inferred: false,
        properties: Default::default(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn metrics_stay_in_range(edges in proptest::collection::vec((0usize..8, 0usize..8), 0..24)) {
        let triples: Vec<TripleRecord> = edges.iter().map(|&(a, b)| record(a, b)).collect();
        let graph = AttributedGraph::from_triples("g", &triples);
        let output = PetgraphAlgorithms
            .compute(&graph, &AlgorithmSet::all(), &CancelFlag::default())
            .unwrap();

        let centrality = output.centrality.unwrap();
        for scores in [&centrality.betweenness, &centrality.closeness, &centrality.eigenvector] {
            let scores = scores.as_ref().unwrap();
            prop_assert_eq!(scores.len(), graph.node_count());
            for &s in scores.values() {
                prop_assert!((-1e-9..=1.0 + 1e-9).contains(&s));
            }
        }

        let clustering = output.clustering.unwrap();
        prop_assert!((0.0..=1.0).contains(&clustering.transitivity));
        prop_assert!((0.0..=1.0).contains(&clustering.average_clustering));

        // Communities partition the node set.
        let communities = output.communities.unwrap();
        let members: Vec<&String> = communities.communities.iter().flatten().collect();
        let unique: BTreeSet<&String> = members.iter().copied().collect();
        prop_assert_eq!(members.len(), graph.node_count());
        prop_assert_eq!(unique.len(), graph.node_count());
        prop_assert!(communities.modularity <= 1.0);
        prop_assert!(members.iter().all(|key| output.names.contains_key(key.as_str())));

        let paths = output.paths.unwrap();
        prop_assert_eq!(paths.connected, paths.components == 1);
        prop_assert_eq!(paths.diameter.is_some(), paths.connected);
    }
}
