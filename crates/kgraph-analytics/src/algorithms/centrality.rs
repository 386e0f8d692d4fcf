//! Node centralities over the directed graph.

use std::collections::VecDeque;

use tracing::warn;

use kgraph_core::KgResult;

use super::projection::Projection;
use super::check;
use crate::pool::CancelFlag;

const UNSEEN: usize = usize::MAX;
const EIGENVECTOR_ITERATIONS: usize = 100;
const EIGENVECTOR_TOLERANCE: f64 = 1e-6;

/// Degree centrality, `(in + out) / (n - 1)`.
pub(super) fn degree(p: &Projection) -> Vec<f64> {
    let n = p.len();
    if n <= 1 {
        return vec![1.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    (0..n).map(|i| p.degree(i) as f64 * scale).collect()
}

/// Brandes betweenness on the unweighted directed graph, normalised by
/// `(n - 1)(n - 2)`.
pub(super) fn betweenness(p: &Projection, cancel: &CancelFlag) -> KgResult<Vec<f64>> {
    let n = p.len();
    let mut centrality = vec![0.0; n];

    for s in 0..n {
        check(cancel)?;
        let mut stack = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist = vec![UNSEEN; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for w in p.successors(v) {
                if dist[w] == UNSEEN {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        centrality.iter_mut().for_each(|c| *c *= scale);
    }
    Ok(centrality)
}

/// Closeness over inbound distances with the Wasserman-Faust correction
/// for graphs that are not strongly connected.
pub(super) fn closeness(p: &Projection, cancel: &CancelFlag) -> KgResult<Vec<f64>> {
    let n = p.len();
    let mut scores = Vec::with_capacity(n);

    for u in 0..n {
        check(cancel)?;
        let mut dist = vec![UNSEEN; n];
        dist[u] = 0;
        let mut queue = VecDeque::from([u]);
        let (mut reached, mut total) = (1usize, 0usize);
        while let Some(v) = queue.pop_front() {
            for w in p.predecessors(v) {
                if dist[w] == UNSEEN {
                    dist[w] = dist[v] + 1;
                    reached += 1;
                    total += dist[w];
                    queue.push_back(w);
                }
            }
        }

        let score = if total > 0 && n > 1 {
            let others = (reached - 1) as f64;
            (others / total as f64) * (others / (n - 1) as f64)
        } else {
            0.0
        };
        scores.push(score);
    }
    Ok(scores)
}

/// Eigenvector centrality by power iteration on `A + I`, following
/// in-edges, L2-normalised.
pub(super) fn eigenvector(p: &Projection, cancel: &CancelFlag) -> KgResult<Vec<f64>> {
    let n = p.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let tolerance = n as f64 * EIGENVECTOR_TOLERANCE;
    let mut x = vec![1.0 / n as f64; n];

    for _ in 0..EIGENVECTOR_ITERATIONS {
        check(cancel)?;
        let last = x.clone();
        for v in 0..n {
            for u in p.predecessors(v) {
                x[v] += last[u];
            }
        }
        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Ok(vec![0.0; n]);
        }
        x.iter_mut().for_each(|v| *v /= norm);

        let change: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if change < tolerance {
            return Ok(x);
        }
    }

    warn!(nodes = n, "Eigenvector centrality did not converge; returning last iterate");
    Ok(x)
}
