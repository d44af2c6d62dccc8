//! FORA: forward push, then random walks over the leftover residue.
//!
//! Wang, Yang, Xiao, Wei, Yang. "FORA: Simple and Effective Approximate
//! Single-Source Personalized PageRank", KDD 2017.
//!
//! With `m` positive-weight edges, `c = 2/3 * epsilon + 2` and `L = ln(2 / p_f)`:
//!
//! - walks per unit of residue: `omega = c * L / (epsilon^2 * delta)`
//! - push threshold: `thr = 1 / sqrt(m * omega)`
//!
//! Push captures the heavy mass exactly. The residue `r` that remains gets
//! `ceil(sum(r) * omega)` walks in total, split across nodes in proportion to
//! `r[v]`; a walk from `v` deposits `r[v] / omega_v` where it stops (see
//! [`ForaConfig::max_walks`] for the capped split). For every node
//! whose PPR is at least `delta`, the estimate is within relative error `epsilon`
//! with probability at least `1 - p_f`.

use crate::graph::GraphView;
use crate::ppr::{push_with, ForwardPushConfig};
use crate::transition::{OutAdjacency, TransitionTable};
use crate::walk::{run_walks, WalkBatch};
use crate::{validate_alpha, validate_source, Error, Result};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForaRun {
    pub scores: Vec<f64>,
    /// Push threshold derived from `epsilon`/`delta`.
    pub threshold: f64,
    /// Walks per unit of residue.
    pub omega: f64,
    /// Residue left after the push phase.
    pub residue_sum: f64,
    /// Random walks actually sampled.
    pub walks: u64,
    pub pushes: usize,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForaConfig {
    /// Per-step stop probability, in \((0,1)\).
    pub alpha: f64,
    /// Target relative error, in \((0,1)\).
    pub epsilon: f64,
    /// Smallest PPR value the error bound covers. Defaults to `1/n`.
    pub delta: Option<f64>,
    /// Failure probability `p_f`. Defaults to `1/n`.
    pub failure_probability: Option<f64>,
    pub seed: u64,
    /// Optional hard cap on the total number of walks, `> 0`. When it binds, the
    /// relative error bound no longer holds.
    pub max_walks: Option<u64>,
}

impl Default for ForaConfig {
    fn default() -> Self {
        Self {
            alpha: 0.15,
            epsilon: 0.5,
            delta: None,
            failure_probability: None,
            seed: 0x5EED,
            max_walks: None,
        }
    }
}

fn check_probability(name: &str, p: Option<f64>) -> Result<()> {
    match p {
        Some(p) if !p.is_finite() || p <= 0.0 || p > 1.0 => Err(Error::InvalidArgument(
            format!("{name} must be in (0,1] ({name}={p})"),
        )),
        _ => Ok(()),
    }
}

impl ForaConfig {
    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 || self.epsilon >= 1.0 {
            return Err(Error::InvalidArgument(format!(
                "epsilon must be in (0,1) (epsilon={})",
                self.epsilon
            )));
        }
        check_probability("delta", self.delta)?;
        check_probability("failure_probability", self.failure_probability)?;
        if self.max_walks == Some(0) {
            return Err(Error::InvalidArgument(
                "max_walks must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `(omega, thr)` for a graph with `n` nodes and `edges` positive-weight edges.
    pub fn walk_budget(&self, n: usize, edges: usize) -> (f64, f64) {
        let fallback = 1.0 / n.max(1) as f64;
        let delta = self.delta.unwrap_or(fallback);
        let p_f = self.failure_probability.unwrap_or(fallback);
        let eps = self.epsilon;

        let omega = (2.0 * eps / 3.0 + 2.0) * (2.0 / p_f).ln() / (eps * eps * delta);
        let thr = 1.0 / (edges.max(1) as f64 * omega).sqrt();
        (omega, thr)
    }
}

/// Splits the walk budget over nodes with positive residue.
///
/// Uncapped, node `v` gets `max(1, ceil(total * r[v] / sum(r)))` walks. When
/// `max_walks` is smaller than the budget, only the `max_walks` largest residues
/// are sampled (one walk each, the rest apportioned by floor), so the plan never
/// exceeds the cap; the residue of unsampled nodes is credited where it sits.
fn plan_walks(
    residue: &[f64],
    residue_sum: f64,
    omega: f64,
    max_walks: Option<u64>,
    scores: &mut [f64],
) -> Vec<WalkBatch> {
    let budget = (residue_sum * omega).ceil();
    let cap = match max_walks {
        Some(cap) if budget > cap as f64 => cap,
        _ => {
            return residue
                .iter()
                .enumerate()
                .filter(|(_, &r)| r > 0.0)
                .map(|(v, &r)| {
                    let count = (budget * r / residue_sum).ceil().max(1.0) as u64;
                    WalkBatch {
                        start: Some(v),
                        count,
                        weight: r / count as f64,
                    }
                })
                .collect();
        }
    };
    log::warn!(
        "fora: walk budget {:.0} exceeds max_walks={}, error bound no longer holds",
        budget,
        cap
    );

    let mut sampled: Vec<usize> = (0..residue.len()).filter(|&v| residue[v] > 0.0).collect();
    sampled.sort_by(|&a, &b| residue[b].total_cmp(&residue[a]).then(a.cmp(&b)));
    let keep = sampled.len().min(cap as usize);
    for &v in &sampled[keep..] {
        scores[v] += residue[v];
    }
    sampled.truncate(keep);

    let kept_sum: f64 = sampled.iter().map(|&v| residue[v]).sum();
    let extra = (cap - keep as u64) as f64;
    sampled
        .into_iter()
        .map(|v| {
            let count = 1 + (extra * residue[v] / kept_sum).floor() as u64;
            WalkBatch {
                start: Some(v),
                count,
                weight: residue[v] / count as f64,
            }
        })
        .collect()
}

/// FORA with default `delta`, failure probability and seed.
pub fn fora<G: GraphView + ?Sized>(
    graph: &G,
    source: &[f64],
    alpha: f64,
    epsilon: f64,
) -> Result<Vec<f64>> {
    let config = ForaConfig {
        alpha,
        epsilon,
        ..ForaConfig::default()
    };
    Ok(fora_run(graph, source, config)?.scores)
}

/// FORA with push/walk statistics.
pub fn fora_run<G: GraphView + ?Sized>(
    graph: &G,
    source: &[f64],
    config: ForaConfig,
) -> Result<ForaRun> {
    config.validate()?;
    let n = graph.node_count();
    validate_source(source, n)?;
    if n == 0 {
        return Ok(ForaRun {
            scores: Vec::new(),
            threshold: 0.0,
            omega: 0.0,
            residue_sum: 0.0,
            walks: 0,
            pushes: 0,
        });
    }

    let adjacency = OutAdjacency::from_graph(graph)?;
    let (omega, threshold) = config.walk_budget(n, adjacency.edge_count());
    log::debug!(
        "fora: n={} edges={} alpha={} epsilon={} omega={:.3e} threshold={:.3e}",
        n,
        adjacency.edge_count(),
        config.alpha,
        config.epsilon,
        omega,
        threshold
    );

    let push = push_with(
        &adjacency,
        source,
        ForwardPushConfig {
            alpha: config.alpha,
            threshold,
            max_pushes: None,
        },
    )?;
    let residue_sum: f64 = push.residue.iter().sum();
    let mut scores = push.reserve;
    if residue_sum <= 0.0 {
        return Ok(ForaRun {
            scores,
            threshold,
            omega,
            residue_sum,
            walks: 0,
            pushes: push.pushes,
        });
    }

    let plan = plan_walks(&push.residue, residue_sum, omega, config.max_walks, &mut scores);
    let walks: u64 = plan.iter().map(|b| b.count).sum();

    let table = TransitionTable::new(&adjacency, config.alpha);
    let tally = run_walks(&table, &plan, config.seed);
    for (s, w) in scores.iter_mut().zip(tally.scores) {
        *s += w;
    }

    log::debug!(
        "fora: {} pushes, residue_sum={:.3e}, {} walks from {} nodes, {} steps",
        push.pushes,
        residue_sum,
        walks,
        plan.len(),
        tally.steps
    );
    Ok(ForaRun {
        scores,
        threshold,
        omega,
        residue_sum,
        walks,
        pushes: push.pushes,
    })
}
