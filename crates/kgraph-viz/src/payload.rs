//! Node and edge lists handed to templates.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::TripleRecord;

use crate::config::RenderConfig;

pub(crate) const PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];
const BASE_SIZE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisNode {
    pub id: String,
    pub label: String,
    pub group: String,
    pub color: String,
    pub degree: usize,
    pub size: f64,
    pub highlighted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: String,
    pub confidence: f64,
    pub inferred: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphPayload {
    pub nodes: Vec<VisNode>,
    pub edges: Vec<VisEdge>,
    /// Some nodes were dropped to honour `max_nodes`.
    pub truncated: bool,
}

struct NodeInfo<'a> {
    key: &'a str,
    name: &'a str,
    entity_type: &'a str,
    degree: usize,
}

impl GraphPayload {
    /// Nodes ordered by degree (then name) and edges between kept nodes.
    /// A `max_nodes` of zero keeps everything.
    pub fn build(triples: &[TripleRecord], config: &RenderConfig) -> Self {
        let visible: Vec<&TripleRecord> =
            triples.iter().filter(|t| config.show_inferred || !t.inferred).collect();

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut infos: Vec<NodeInfo<'_>> = Vec::new();
        for t in &visible {
            for (key, name, entity_type) in [
                (t.subject_key.as_str(), t.subject.as_str(), t.subject_type.as_str()),
                (t.object_key.as_str(), t.object.as_str(), t.object_type.as_str()),
            ] {
                let i = *index.entry(key).or_insert_with(|| {
                    infos.push(NodeInfo { key, name, entity_type, degree: 0 });
                    infos.len() - 1
                });
                infos[i].degree += 1;
            }
        }

        infos.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.name.cmp(b.name)));
        let truncated = config.max_nodes > 0 && infos.len() > config.max_nodes;
        if truncated {
            infos.truncate(config.max_nodes);
        }

        let types: BTreeSet<&str> = infos.iter().map(|n| n.entity_type).collect();
        let color_of: HashMap<&str, &str> =
            types.into_iter().enumerate().map(|(i, t)| (t, PALETTE[i % PALETTE.len()])).collect();

        let nodes: Vec<VisNode> = infos
            .iter()
            .map(|n| VisNode {
                id: n.key.to_string(),
                label: n.name.to_string(),
                group: n.entity_type.to_string(),
                color: if config.color_by_type {
                    color_of.get(n.entity_type).copied().unwrap_or(PALETTE[0]).to_string()
                } else {
                    PALETTE[0].to_string()
                },
                degree: n.degree,
                size: BASE_SIZE + 4.0 * (n.degree as f64).sqrt(),
                highlighted: false,
                community: None,
            })
            .collect();

        let kept: HashSet<&str> = infos.iter().map(|n| n.key).collect();
        let edges = visible
            .iter()
            .filter(|t| {
                kept.contains(t.subject_key.as_str()) && kept.contains(t.object_key.as_str())
            })
            .map(|t| VisEdge {
                id: t.key.clone(),
                from: t.subject_key.clone(),
                to: t.object_key.clone(),
                label: t.predicate.clone(),
                confidence: t.confidence,
                inferred: t.inferred,
            })
            .collect();

        Self { nodes, edges, truncated }
    }

    /// Colour nodes by community, size them by degree centrality and flag
    /// the `top` most central ones. Metrics are matched on entity key.
    pub fn apply_metrics(&mut self, metrics: &AdvancedMetrics, top: usize) {
        if let Some(result) = &metrics.communities {
            let community_of: HashMap<&str, usize> = result
                .communities
                .iter()
                .enumerate()
                .flat_map(|(i, members)| members.iter().map(move |m| (m.as_str(), i)))
                .collect();
            for node in &mut self.nodes {
                if let Some(&c) = community_of.get(node.id.as_str()) {
                    node.community = Some(c);
                    node.color = PALETTE[c % PALETTE.len()].to_string();
                }
            }
        }

        if let Some(centrality) = &metrics.centrality {
            if let Some(degree) = &centrality.degree {
                for node in &mut self.nodes {
                    if let Some(score) = degree.get(&node.id) {
                        node.size = BASE_SIZE + 30.0 * score;
                    }
                }
            }
            let leaders: HashSet<String> =
                centrality.top_by_degree(top).into_iter().map(|(key, _)| key).collect();
            for node in &mut self.nodes {
                node.highlighted = leaders.contains(&node.id);
            }
        }
    }

    /// JSON safe to embed inside a `<script>` element.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        script_json(self)
    }
}

pub(crate) fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use kgraph_core::{keys, TripleRecord};

    pub fn triple(s: &str, p: &str, o: &str, inferred: bool) -> TripleRecord {
        let (subject_key, object_key) = (keys::entity_key(s), keys::entity_key(o));
        TripleRecord {
            key: keys::relation_key(&subject_key, p, &object_key),
            graph_id: "g".into(),
            subject_key,
            subject: s.into(),
            subject_type: if s.starts_with('#') { "tag".into() } else { "entity".into() },
            predicate: p.into(),
            object_key,
            object: o.into(),
            object_type: if o.starts_with('#') { "tag".into() } else { "entity".into() },
            confidence: 1.0,
            inferred,
            properties: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::triple;
    use super::*;
    use kgraph_analytics::{AlgorithmOutput, CentralityScores, CommunityResult};
    use kgraph_core::keys;
    use std::collections::BTreeMap;

    fn sample() -> Vec<TripleRecord> {
        vec![
            triple("Hub", "links", "A", false),
            triple("Hub", "links", "B", false),
            triple("Hub", "tagged", "#core", true),
            triple("A", "links", "B", false),
        ]
    }

    #[test]
    fn nodes_are_ranked_by_degree() {
        let payload = GraphPayload::build(&sample(), &RenderConfig::default());
        assert_eq!(payload.nodes[0].label, "Hub");
        assert_eq!(payload.nodes[0].degree, 3);
        assert_eq!(payload.edges.len(), 4);
        assert!(!payload.truncated);
    }

    #[test]
    fn inferred_edges_can_be_hidden() {
        let config = RenderConfig { show_inferred: false, ..RenderConfig::default() };
        let payload = GraphPayload::build(&sample(), &config);
        assert_eq!(payload.edges.len(), 3);
        assert!(payload.nodes.iter().all(|n| n.label != "#core"));
    }

    #[test]
    fn max_nodes_keeps_the_most_connected() {
        let config = RenderConfig { max_nodes: 2, ..RenderConfig::default() };
        let payload = GraphPayload::build(&sample(), &config);
        assert!(payload.truncated);
        let labels: Vec<&str> = payload.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Hub", "A"]);
        // Only the edge between the kept nodes survives.
        assert_eq!(payload.edges.len(), 1);
    }

    #[test]
    fn colours_follow_entity_type() {
        let payload = GraphPayload::build(&sample(), &RenderConfig::default());
        let tag = payload.nodes.iter().find(|n| n.group == "tag").unwrap();
        let hub = payload.nodes.iter().find(|n| n.label == "Hub").unwrap();
        assert_ne!(tag.color, hub.color);

        let config = RenderConfig { color_by_type: false, ..RenderConfig::default() };
        let plain = GraphPayload::build(&sample(), &config);
        assert!(plain.nodes.iter().all(|n| n.color == plain.nodes[0].color));
    }

    #[test]
    fn metrics_overlay_marks_communities_and_leaders() {
        let mut payload = GraphPayload::build(&sample(), &RenderConfig::default());
        let key = |name: &str| keys::entity_key(name);
        let output = AlgorithmOutput {
            centrality: Some(CentralityScores {
                degree: Some(BTreeMap::from([(key("Hub"), 1.0), (key("A"), 0.66)])),
                ..Default::default()
            }),
            communities: Some(CommunityResult {
                communities: vec![vec![key("A"), key("B"), key("Hub")], vec![key("#core")]],
                modularity: 0.1,
            }),
            ..Default::default()
        };
        let algorithms = vec!["degree".into(), "communities".into()];
        let metrics = AdvancedMetrics::new("g", 4, 4, algorithms, output);
        payload.apply_metrics(&metrics, 1);

        let hub = payload.nodes.iter().find(|n| n.label == "Hub").unwrap();
        assert!(hub.highlighted);
        assert_eq!(hub.community, Some(0));
        assert_eq!(hub.size, 40.0);
        let tag = payload.nodes.iter().find(|n| n.label == "#core").unwrap();
        assert_eq!(tag.community, Some(1));
        assert!(!tag.highlighted);
    }

    #[test]
    fn overlay_tells_apart_entities_that_share_a_label() {
        let mut twin = triple("Hub", "links", "Twin", false);
        twin.object_key = "twin-2".into();
        twin.key = "hub-links-twin-2".into();
        let mut triples = sample();
        triples.push(triple("Hub", "links", "Twin", false));
        triples.push(twin);
        let mut payload = GraphPayload::build(&triples, &RenderConfig::default());

        let output = AlgorithmOutput {
            centrality: Some(CentralityScores {
                degree: Some(BTreeMap::from([(key_of("Twin"), 0.9), ("twin-2".to_string(), 0.1)])),
                ..Default::default()
            }),
            communities: Some(CommunityResult {
                communities: vec![vec![key_of("Twin")], vec!["twin-2".to_string()]],
                modularity: 0.0,
            }),
            ..Default::default()
        };
        let metrics = AdvancedMetrics::new("g", 6, 6, vec!["degree".into()], output);
        payload.apply_metrics(&metrics, 1);

        let twins: Vec<&VisNode> = payload.nodes.iter().filter(|n| n.label == "Twin").collect();
        assert_eq!(twins.len(), 2);
        let first = twins.iter().find(|n| n.id == key_of("Twin")).unwrap();
        let second = twins.iter().find(|n| n.id == "twin-2").unwrap();
        assert!(first.highlighted);
        assert!(!second.highlighted);
        assert_eq!((first.community, second.community), (Some(0), Some(1)));
        assert_ne!(first.size, second.size);
    }

    fn key_of(name: &str) -> String {
        keys::entity_key(name)
    }

    #[test]
    fn script_json_cannot_close_the_script_element() {
        let triples = [triple("</script>", "p", "x", false)];
        let payload = GraphPayload::build(&triples, &RenderConfig::default());
        let json = payload.to_script_json().unwrap();
        assert!(!json.contains("</script>"));
        assert!(json.contains("<\\/script>"));
    }
}
