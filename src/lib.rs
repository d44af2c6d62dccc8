//! `rankwalk`: PageRank / personalized PageRank estimators over weighted directed graphs.
//!
//! Three estimators with different accuracy/cost tradeoffs:
//! - [`power_iteration_pagerank`]: Monte-Carlo PageRank from independent damped random walks.
//! - [`forward_push`]: deterministic local propagation into a settled `reserve` and a
//!   leftover `residue`.
//! - [`fora`]: forward push followed by random walks over the residue, with a relative
//!   error bound (Wang et al., "FORA", KDD 2017).
//!
//! Public invariants (must not drift):
//! - **Node order**: outputs are indexed by node id \(0..n-1\) as exposed by [`GraphView`].
//! - **Damping**: `alpha` is the per-step *stop/restart* probability, in the open interval
//!   \((0,1)\). This is `1 - d` for the usual damping `d = 0.85`.
//! - **Mass conservation**: forward push keeps `sum(reserve) + sum(residue) == sum(source)`.
//! - **Determinism**: forward push is deterministic; sampling estimators are deterministic
//!   given identical inputs and seed.
//! - **No silent normalization**: source vectors are used as given (they need not sum to 1).
//!
//! Swappable (allowed to change without breaking the contract):
//! - iteration strategy (serial vs sharded parallel walks)
//! - push scheduling order (so long as the threshold post-condition holds)
//! - internal data structures (so long as invariants hold)

pub mod fora;
pub mod graph;
pub mod pagerank;
pub mod ppr;
pub mod topk;
pub mod transition;
mod walk;

pub use fora::{fora, fora_run, ForaConfig, ForaRun};
pub use graph::{AdjacencyList, AdjacencyMatrix, GraphBuilder, GraphView};
pub use pagerank::{
    power_iteration_pagerank, power_iteration_pagerank_run, PowerIterationConfig,
    PowerIterationRun,
};
pub use ppr::{forward_push, forward_push_run, ForwardPush, ForwardPushConfig, PushRun};
pub use topk::{normalize, top_k};
pub use transition::{OutAdjacency, TransitionTable};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(usize),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shared range check for the restart probability used by every estimator.
pub(crate) fn validate_alpha(alpha: f64) -> Result<()> {
    if !alpha.is_finite() {
        return Err(Error::InvalidArgument("alpha must be finite".to_string()));
    }
    if alpha <= 0.0 || alpha >= 1.0 {
        return Err(Error::InvalidArgument(format!(
            "alpha must be in (0,1) (alpha={alpha})"
        )));
    }
    Ok(())
}

/// Validates a source/personalization vector against the node count.
pub(crate) fn validate_source(source: &[f64], n: usize) -> Result<()> {
    if source.len() != n {
        return Err(Error::InvalidArgument(format!(
            "source length must equal node_count (len={} node_count={})",
            source.len(),
            n
        )));
    }
    for &x in source {
        if !x.is_finite() {
            return Err(Error::InvalidArgument(
                "source entries must be finite".to_string(),
            ));
        }
        if x < 0.0 {
            return Err(Error::InvalidArgument(
                "source entries must be non-negative".to_string(),
            ));
        }
    }
    Ok(())
}
