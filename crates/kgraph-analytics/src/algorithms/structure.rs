//! Clustering and path metrics on the undirected projection.

use petgraph::algo::{connected_components, dijkstra};
use petgraph::graph::NodeIndex;

use kgraph_core::KgResult;

use super::check;
use super::projection::Projection;
use super::PathResult;
use crate::pool::CancelFlag;

/// Local clustering coefficients and global transitivity.
pub(super) fn clustering(p: &Projection) -> (Vec<f64>, f64) {
    let mut coefficients = Vec::with_capacity(p.len());
    let (mut closed, mut triads) = (0usize, 0usize);

    for nbrs in &p.neighbors {
        let k = nbrs.len();
        let mut links = 0;
        for &a in nbrs {
            links += nbrs.range(a + 1..).filter(|&&b| p.neighbors[a].contains(&b)).count();
        }
        let possible = k * k.saturating_sub(1) / 2;
        coefficients.push(if possible == 0 { 0.0 } else { links as f64 / possible as f64 });
        closed += links;
        triads += possible;
    }

    let transitivity = if triads == 0 { 0.0 } else { closed as f64 / triads as f64 };
    (coefficients, transitivity)
}

/// Average shortest-path length and diameter when the projection is
/// connected, otherwise just the component count.
pub(super) fn paths(p: &Projection, cancel: &CancelFlag) -> KgResult<PathResult> {
    let n = p.len();
    let components = if n == 0 { 0 } else { connected_components(&p.undirected) };
    if components != 1 {
        return Ok(PathResult { connected: false, components, ..PathResult::default() });
    }

    let (mut total, mut diameter) = (0usize, 0usize);
    for s in 0..n {
        check(cancel)?;
        for (_, d) in dijkstra(&p.undirected, NodeIndex::new(s), None, |_| 1usize) {
            total += d;
            diameter = diameter.max(d);
        }
    }

    let average = if n > 1 { total as f64 / (n * (n - 1)) as f64 } else { 0.0 };
    Ok(PathResult {
        connected: true,
        components,
        average_shortest_path_length: Some(average),
        diameter: Some(diameter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::projection::fixtures;

    #[test]
    fn triangle_is_fully_clustered() {
        let p = Projection::new(&fixtures::graph(3, &[(0, 1), (1, 2), (2, 0)]));
        let (coefficients, transitivity) = clustering(&p);
        assert_eq!(coefficients, vec![1.0, 1.0, 1.0]);
        assert_eq!(transitivity, 1.0);
    }

    #[test]
    fn star_has_no_triangles() {
        let p = Projection::new(&fixtures::graph(4, &[(0, 1), (0, 2), (0, 3)]));
        let (coefficients, transitivity) = clustering(&p);
        assert!(coefficients.iter().all(|&c| c == 0.0));
        assert_eq!(transitivity, 0.0);
    }

    #[test]
    fn chain_path_metrics() {
        let p = Projection::new(&fixtures::graph(3, &[(0, 1), (1, 2)]));
        let result = paths(&p, &CancelFlag::default()).unwrap();
        assert!(result.connected);
        assert_eq!(result.diameter, Some(2));
        let average = result.average_shortest_path_length.unwrap();
        assert!((average - 8.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn disconnected_graph_reports_components_only() {
        let p = Projection::new(&fixtures::graph(4, &[(0, 1), (2, 3)]));
        let result = paths(&p, &CancelFlag::default()).unwrap();
        assert!(!result.connected);
        assert_eq!(result.components, 2);
        assert!(result.average_shortest_path_length.is_none());
        assert!(result.diameter.is_none());
    }

    #[test]
    fn empty_graph_has_zero_components() {
        let p = Projection::new(&fixtures::graph(0, &[]));
        let result = paths(&p, &CancelFlag::default()).unwrap();
        assert_eq!(result.components, 0);
        assert!(!result.connected);
    }
}
