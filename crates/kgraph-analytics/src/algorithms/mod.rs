//! Graph algorithms behind a capability check.
//!
//! The petgraph-backed provider is compiled in with the `algorithms`
//! feature. Without it [`default_provider`] returns [`DisabledAlgorithms`],
//! which reports itself unavailable so callers degrade in one place.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kgraph_core::{KgError, KgResult};

use crate::attributed::AttributedGraph;
use crate::pool::CancelFlag;

#[cfg(feature = "algorithms")]
mod centrality;
#[cfg(feature = "algorithms")]
mod community;
#[cfg(feature = "algorithms")]
mod projection;
#[cfg(feature = "algorithms")]
mod structure;

// ----------------------------------------------------------------------------
// Algorithm selection
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Degree,
    Betweenness,
    Closeness,
    Eigenvector,
    Communities,
    Clustering,
    Paths,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Degree,
        Algorithm::Betweenness,
        Algorithm::Closeness,
        Algorithm::Eigenvector,
        Algorithm::Communities,
        Algorithm::Clustering,
        Algorithm::Paths,
    ];

    pub const CENTRALITY: [Algorithm; 4] =
        [Algorithm::Degree, Algorithm::Betweenness, Algorithm::Closeness, Algorithm::Eigenvector];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Degree => "degree",
            Algorithm::Betweenness => "betweenness",
            Algorithm::Closeness => "closeness",
            Algorithm::Eigenvector => "eigenvector",
            Algorithm::Communities => "communities",
            Algorithm::Clustering => "clustering",
            Algorithm::Paths => "paths",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalised, ordered selection of algorithms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlgorithmSet(BTreeSet<Algorithm>);

impl AlgorithmSet {
    pub fn all() -> Self {
        Self(Algorithm::ALL.into_iter().collect())
    }

    /// Parse request names. `centrality` expands to the four centralities,
    /// `all` or an empty list selects everything.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> KgResult<Self> {
        if names.is_empty() {
            return Ok(Self::all());
        }
        let mut set = BTreeSet::new();
        for name in names {
            match name.as_ref().trim().to_lowercase().as_str() {
                "all" => set.extend(Algorithm::ALL),
                "centrality" => set.extend(Algorithm::CENTRALITY),
                "degree" => {
                    set.insert(Algorithm::Degree);
                }
                "betweenness" => {
                    set.insert(Algorithm::Betweenness);
                }
                "closeness" => {
                    set.insert(Algorithm::Closeness);
                }
                "eigenvector" => {
                    set.insert(Algorithm::Eigenvector);
                }
                "communities" => {
                    set.insert(Algorithm::Communities);
                }
                "clustering" => {
                    set.insert(Algorithm::Clustering);
                }
                "paths" => {
                    set.insert(Algorithm::Paths);
                }
                other => return Err(KgError::validation(format!("unknown algorithm '{other}'"))),
            }
        }
        Ok(Self(set))
    }

    pub fn contains(&self, algorithm: Algorithm) -> bool {
        self.0.contains(&algorithm)
    }

    pub fn wants_centrality(&self) -> bool {
        Algorithm::CENTRALITY.iter().any(|a| self.0.contains(a))
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|a| a.as_str().to_string()).collect()
    }

    /// Stable cache-key fragment, e.g. `degree,paths`.
    pub fn key(&self) -> String {
        self.names().join(",")
    }
}

impl FromStr for AlgorithmSet {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names: Vec<&str> = s.split(',').map(str::trim).filter(|n| !n.is_empty()).collect();
        Self::parse(&names)
    }
}

// ----------------------------------------------------------------------------
// Results
// ----------------------------------------------------------------------------

/// Per-node scores keyed by entity key. Only requested measures are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub betweenness: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closeness: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eigenvector: Option<BTreeMap<String, f64>>,
}

impl CentralityScores {
    /// Entity keys ranked by degree centrality, highest first.
    pub fn top_by_degree(&self, n: usize) -> Vec<(String, f64)> {
        let Some(degree) = &self.degree else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = degree.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityResult {
    /// Member keys per community, largest community first.
    pub communities: Vec<Vec<String>>,
    pub modularity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub average_clustering: f64,
    pub transitivity: f64,
    pub coefficients: BTreeMap<String, f64>,
}

/// Path metrics over the undirected projection. Length and diameter are
/// only defined when the projection is connected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub connected: bool,
    pub components: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_shortest_path_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diameter: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlgorithmOutput {
    /// Display name of every entity key the results mention.
    pub names: BTreeMap<String, String>,
    pub centrality: Option<CentralityScores>,
    pub communities: Option<CommunityResult>,
    pub clustering: Option<ClusteringResult>,
    pub paths: Option<PathResult>,
}

// ----------------------------------------------------------------------------
// Providers
// ----------------------------------------------------------------------------

/// Capability-checked algorithm component.
///
/// `compute` runs on a blocking worker and should return early once
/// `cancel` is raised.
pub trait AlgorithmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn available(&self) -> bool;

    fn compute(
        &self,
        graph: &AttributedGraph,
        set: &AlgorithmSet,
        cancel: &CancelFlag,
    ) -> KgResult<AlgorithmOutput>;
}

/// Stand-in used when graph algorithms are not compiled in.
#[derive(Debug, Default)]
pub struct DisabledAlgorithms;

impl AlgorithmProvider for DisabledAlgorithms {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn available(&self) -> bool {
        false
    }

    fn compute(
        &self,
        _: &AttributedGraph,
        _: &AlgorithmSet,
        _: &CancelFlag,
    ) -> KgResult<AlgorithmOutput> {
        Err(KgError::AnalyticsUnavailable("graph algorithms are not installed".into()))
    }
}

/// Algorithms backed by petgraph.
#[cfg(feature = "algorithms")]
#[derive(Debug, Default)]
pub struct PetgraphAlgorithms;

#[cfg(feature = "algorithms")]
impl AlgorithmProvider for PetgraphAlgorithms {
    fn name(&self) -> &'static str {
        "petgraph"
    }

    fn available(&self) -> bool {
        true
    }

    fn compute(
        &self,
        graph: &AttributedGraph,
        set: &AlgorithmSet,
        cancel: &CancelFlag,
    ) -> KgResult<AlgorithmOutput> {
        let projection = projection::Projection::new(graph);
        let keyed = |scores: Vec<f64>| -> BTreeMap<String, f64> {
            scores.into_iter().enumerate().map(|(i, s)| (graph.key(i).to_string(), s)).collect()
        };

        let mut output = AlgorithmOutput {
            names: graph.nodes.iter().map(|n| (n.key.clone(), n.name.clone())).collect(),
            ..AlgorithmOutput::default()
        };

        if set.wants_centrality() {
            let mut scores = CentralityScores::default();
            if set.contains(Algorithm::Degree) {
                scores.degree = Some(keyed(centrality::degree(&projection)));
            }
            if set.contains(Algorithm::Betweenness) {
                scores.betweenness = Some(keyed(centrality::betweenness(&projection, cancel)?));
            }
            if set.contains(Algorithm::Closeness) {
                scores.closeness = Some(keyed(centrality::closeness(&projection, cancel)?));
            }
            if set.contains(Algorithm::Eigenvector) {
                scores.eigenvector = Some(keyed(centrality::eigenvector(&projection, cancel)?));
            }
            output.centrality = Some(scores);
        }

        if set.contains(Algorithm::Communities) {
            let (groups, modularity) = community::greedy_modularity(&projection, cancel)?;
            let mut communities: Vec<Vec<String>> = groups
                .into_iter()
                .map(|members| {
                    let mut group: Vec<String> =
                        members.into_iter().map(|i| graph.key(i).to_string()).collect();
                    group.sort();
                    group
                })
                .collect();
            communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            output.communities = Some(CommunityResult { communities, modularity });
        }

        if set.contains(Algorithm::Clustering) {
            let (coefficients, transitivity) = structure::clustering(&projection);
            let average_clustering = if coefficients.is_empty() {
                0.0
            } else {
                coefficients.iter().sum::<f64>() / coefficients.len() as f64
            };
            output.clustering = Some(ClusteringResult {
                average_clustering,
                transitivity,
                coefficients: keyed(coefficients),
            });
        }

        if set.contains(Algorithm::Paths) {
            output.paths = Some(structure::paths(&projection, cancel)?);
        }

        Ok(output)
    }
}

/// Best provider compiled into this build.
pub fn default_provider() -> Arc<dyn AlgorithmProvider> {
    #[cfg(feature = "algorithms")]
    {
        Arc::new(PetgraphAlgorithms)
    }
    #[cfg(not(feature = "algorithms"))]
    {
        Arc::new(DisabledAlgorithms)
    }
}

/// Bail out of a long loop once the caller gave up.
#[cfg(feature = "algorithms")]
fn check(cancel: &CancelFlag) -> KgResult<()> {
    if cancel.is_cancelled() {
        return Err(KgError::AnalyticsUnavailable("computation cancelled".into()));
    }
    Ok(())
}
