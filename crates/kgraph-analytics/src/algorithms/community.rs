//! Greedy modularity communities on the undirected projection.

use std::collections::BTreeMap;

use kgraph_core::KgResult;

use super::check;
use super::projection::Projection;
use crate::pool::CancelFlag;

const MIN_GAIN: f64 = 1e-12;

/// Clauset-Newman-Moore agglomeration. Starts from singletons and merges
/// the pair with the largest modularity gain until no merge improves it.
/// Returns the node groups and the modularity of the final partition.
pub(super) fn greedy_modularity(
    p: &Projection,
    cancel: &CancelFlag,
) -> KgResult<(Vec<Vec<usize>>, f64)> {
    let n = p.len();
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let m = p.undirected_edge_count() as f64;
    if m == 0.0 {
        return Ok((members.into_iter().flatten().collect(), 0.0));
    }

    let half = 1.0 / (2.0 * m);
    // a[i]: fraction of edge ends in community i.
    let mut a: Vec<f64> = (0..n).map(|i| p.neighbors[i].len() as f64 * half).collect();
    // e[i][j]: fraction of edge ends joining communities i and j, symmetric.
    let mut e: Vec<BTreeMap<usize, f64>> =
        (0..n).map(|i| p.neighbors[i].iter().map(|&j| (j, half)).collect()).collect();

    loop {
        check(cancel)?;
        let mut best: Option<(usize, usize, f64)> = None;
        for (i, row) in e.iter().enumerate() {
            for (&j, &eij) in row.range(i + 1..) {
                let gain = 2.0 * (eij - a[i] * a[j]);
                if best.map_or(true, |(_, _, b)| gain > b) {
                    best = Some((i, j, gain));
                }
            }
        }
        let Some((i, j, gain)) = best else { break };
        if gain <= MIN_GAIN {
            break;
        }

        // Fold j into i.
        for (k, ejk) in std::mem::take(&mut e[j]) {
            if k == i {
                continue;
            }
            *e[i].entry(k).or_insert(0.0) += ejk;
            if let Some(v) = e[k].remove(&j) {
                *e[k].entry(i).or_insert(0.0) += v;
            }
        }
        e[i].remove(&j);
        a[i] += a[j];
        a[j] = 0.0;
        let moved = members[j].take().unwrap_or_default();
        if let Some(group) = members[i].as_mut() {
            group.extend(moved);
        }
    }

    let communities: Vec<Vec<usize>> = members.into_iter().flatten().collect();
    let score = modularity(p, &communities, m);
    Ok((communities, score))
}

fn modularity(p: &Projection, communities: &[Vec<usize>], m: f64) -> f64 {
    let mut label = vec![0; p.len()];
    for (c, group) in communities.iter().enumerate() {
        for &v in group {
            label[v] = c;
        }
    }
    let mut internal = vec![0.0; communities.len()];
    let mut degree = vec![0.0; communities.len()];
    for (v, nbrs) in p.neighbors.iter().enumerate() {
        degree[label[v]] += nbrs.len() as f64;
        let inside = nbrs.iter().filter(|&&w| w > v && label[w] == label[v]).count();
        internal[label[v]] += inside as f64;
    }
    internal
        .iter()
        .zip(&degree)
        .map(|(l, d)| l / m - (d / (2.0 * m)).powi(2))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::projection::fixtures;

    #[test]
    fn two_triangles_split_at_the_bridge() {
        let edges = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 5), (5, 3)];
        let p = Projection::new(&fixtures::graph(6, &edges));
        let (mut groups, score) = greedy_modularity(&p, &CancelFlag::default()).unwrap();
        groups.iter_mut().for_each(|g| g.sort());
        groups.sort();
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert!((score - 5.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn edgeless_graph_stays_singletons() {
        let p = Projection::new(&fixtures::graph(3, &[]));
        let (groups, score) = greedy_modularity(&p, &CancelFlag::default()).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(score, 0.0);
    }
}
