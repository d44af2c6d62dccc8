//! Per-call snapshots of the out-adjacency and the random-walk transition table.
//!
//! Both structures are built once at the start of an estimator call and dropped on
//! return; nothing is cached across calls.

use crate::graph::GraphView;
use crate::{Error, Result};

/// CSR copy of a graph's positive-weight out-edges, with out-weight sums.
#[derive(Debug, Clone)]
pub struct OutAdjacency {
    offsets: Vec<usize>,
    targets: Vec<usize>,
    weights: Vec<f64>,
    out_wsum: Vec<f64>,
}

impl OutAdjacency {
    /// Reads every node's adjacents once.
    ///
    /// Errors from the graph propagate unchanged. Targets outside `0..n` are
    /// [`Error::NodeNotFound`]; negative or non-finite weights are
    /// [`Error::InvalidArgument`]. Zero-weight edges are dropped.
    pub fn from_graph<G: GraphView + ?Sized>(graph: &G) -> Result<Self> {
        let n = graph.node_count();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut targets = Vec::new();
        let mut weights = Vec::new();
        let mut out_wsum = Vec::with_capacity(n);
        offsets.push(0);

        for u in 0..n {
            let mut sum = 0.0;
            for (v, w) in graph.adjacents(u)? {
                if v >= n {
                    return Err(Error::NodeNotFound(v));
                }
                if !w.is_finite() || w < 0.0 {
                    return Err(Error::InvalidArgument(format!(
                        "edge weights must be finite and non-negative ({u}->{v}: {w})"
                    )));
                }
                if w == 0.0 {
                    continue;
                }
                targets.push(v);
                weights.push(w);
                sum += w;
            }
            offsets.push(targets.len());
            out_wsum.push(sum);
        }

        Ok(Self {
            offsets,
            targets,
            weights,
            out_wsum,
        })
    }

    pub fn node_count(&self) -> usize {
        self.out_wsum.len()
    }

    /// Number of positive-weight edges.
    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    pub fn out_weight_sum(&self, node: usize) -> f64 {
        self.out_wsum[node]
    }

    pub fn is_dangling(&self, node: usize) -> bool {
        self.offsets[node] == self.offsets[node + 1]
    }

    /// `(target, weight)` pairs of `node`'s positive-weight out-edges.
    pub fn edges(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.offsets[node]..self.offsets[node + 1];
        self.targets[range.clone()]
            .iter()
            .copied()
            .zip(self.weights[range].iter().copied())
    }

    fn range(&self, node: usize) -> std::ops::Range<usize> {
        self.offsets[node]..self.offsets[node + 1]
    }
}

/// Outcome of one random-walk step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The walk terminates at the current node.
    Stop,
    /// The current node is dangling; jump to a uniformly random node.
    Teleport,
    /// Continue along an out-edge to this node.
    Move(usize),
}

/// Prefix-sum transition table over an [`OutAdjacency`].
///
/// For node `u` with out-edges `e_1..e_k` and cumulative weight fractions
/// `f_1 <= .. <= f_k = 1`, the bound of `e_i` is `alpha + (1 - alpha) * f_i`.
/// A single uniform draw `r` in `[0,1)` then decides the whole step: `r < alpha`
/// stops, otherwise the walk follows the first edge whose bound is `>= r`.
#[derive(Debug, Clone)]
pub struct TransitionTable<'a> {
    adjacency: &'a OutAdjacency,
    alpha: f64,
    bounds: Vec<f64>,
}

impl<'a> TransitionTable<'a> {
    pub fn new(adjacency: &'a OutAdjacency, alpha: f64) -> Self {
        let mut bounds = Vec::with_capacity(adjacency.edge_count());
        for u in 0..adjacency.node_count() {
            let range = adjacency.range(u);
            if range.is_empty() {
                continue;
            }
            let total = adjacency.out_wsum[u];
            let mut acc = 0.0;
            for &w in &adjacency.weights[range.clone()] {
                acc += w;
                bounds.push(alpha + (1.0 - alpha) * (acc / total));
            }
            // Pin the last bound so rounding never leaves a gap below 1.0.
            if let Some(last) = bounds.last_mut() {
                *last = 1.0;
            }
        }
        Self {
            adjacency,
            alpha,
            bounds,
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.node_count()
    }

    /// Resolves one step from `node` given a draw `r` in `[0,1)`.
    pub fn step(&self, node: usize, r: f64) -> Step {
        if r < self.alpha {
            return Step::Stop;
        }
        let range = self.adjacency.range(node);
        if range.is_empty() {
            return Step::Teleport;
        }
        let bounds = &self.bounds[range.clone()];
        let i = bounds.partition_point(|&b| b < r).min(bounds.len() - 1);
        Step::Move(self.adjacency.targets[range.start + i])
    }
}
