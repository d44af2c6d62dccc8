//! Monte-Carlo PageRank from independent damped random walks.
//!
//! Each trial starts at a uniformly random node and walks until a stop draw
//! (probability `alpha` per step); the terminal node is the sample. Dangling nodes
//! teleport uniformly. `visits[v] / trials` is an unbiased estimate of the damped
//! PageRank of `v`, with error \(O(1/\sqrt{\text{trials}})\).

use crate::graph::GraphView;
use crate::transition::{OutAdjacency, TransitionTable};
use crate::walk::{run_walks, WalkBatch};
use crate::{validate_alpha, Error, Result};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerIterationRun {
    pub scores: Vec<f64>,
    /// Number of walks sampled.
    pub trials: usize,
    /// Total edge/teleport steps across all walks.
    pub steps: u64,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerIterationConfig {
    /// Per-step stop probability, in \((0,1)\).
    pub alpha: f64,
    /// Number of independent trials, `>= 1`.
    pub iterations: usize,
    pub seed: u64,
}

impl Default for PowerIterationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.15,
            iterations: 1_000_000,
            seed: 0x5EED,
        }
    }
}

impl PowerIterationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        if self.iterations == 0 {
            return Err(Error::InvalidArgument(
                "iterations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Monte-Carlo PageRank with `iter` trials and the default seed.
pub fn power_iteration_pagerank<G: GraphView + ?Sized>(
    graph: &G,
    alpha: f64,
    iter: usize,
) -> Result<Vec<f64>> {
    let config = PowerIterationConfig {
        alpha,
        iterations: iter,
        ..PowerIterationConfig::default()
    };
    Ok(power_iteration_pagerank_run(graph, config)?.scores)
}

/// Monte-Carlo PageRank with sampling statistics.
pub fn power_iteration_pagerank_run<G: GraphView + ?Sized>(
    graph: &G,
    config: PowerIterationConfig,
) -> Result<PowerIterationRun> {
    config.validate()?;
    let n = graph.node_count();
    if n == 0 {
        return Ok(PowerIterationRun {
            scores: Vec::new(),
            trials: 0,
            steps: 0,
        });
    }

    let adjacency = OutAdjacency::from_graph(graph)?;
    let table = TransitionTable::new(&adjacency, config.alpha);
    log::debug!(
        "power iteration: n={} edges={} alpha={} trials={}",
        n,
        adjacency.edge_count(),
        config.alpha,
        config.iterations
    );

    let plan = [WalkBatch {
        start: None,
        count: config.iterations as u64,
        weight: 1.0,
    }];
    let tally = run_walks(&table, &plan, config.seed);
    let inv = 1.0 / config.iterations as f64;
    let scores: Vec<f64> = tally.scores.into_iter().map(|visits| visits * inv).collect();

    log::debug!(
        "power iteration: {} steps ({:.2} per trial)",
        tally.steps,
        tally.steps as f64 * inv
    );
    Ok(PowerIterationRun {
        scores,
        trials: config.iterations,
        steps: tally.steps,
    })
}
