//! Personalized PageRank by forward push.
//!
//! Starting from `residue = source` and `reserve = 0`, repeatedly pick a node `u`
//! whose normalized residue `residue[u] / out_weight_sum[u]` exceeds the threshold
//! and push it:
//!
//! ```text
//! reserve[u] += alpha * residue[u]
//! residue[v] += (1 - alpha) * residue[u] * w(u,v) / out_weight_sum[u]   for each u -> v
//! residue[u]  = 0
//! ```
//!
//! A dangling `u` (no positive-weight out-edges) is normalized by 1 and settles its
//! whole residue into `reserve[u]`. Every push moves mass without creating or
//! destroying it, so `sum(reserve) + sum(residue) == sum(source)` holds after every
//! step. `reserve[v]` is a lower bound on the PPR of `v` that only grows.
//!
//! Active nodes are scheduled FIFO. Each push strictly decreases total residue by at
//! least `alpha * threshold * min_out_weight_sum`, so the loop terminates. The
//! threshold must be a normal float, and a residue too small for `alpha * r` to be
//! representable settles whole, so rounding cannot keep mass circulating forever.

use std::collections::VecDeque;

use crate::graph::GraphView;
use crate::transition::OutAdjacency;
use crate::{validate_alpha, validate_source, Error, Result};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PushRun {
    pub reserve: Vec<f64>,
    pub residue: Vec<f64>,
    /// Number of push operations performed.
    pub pushes: usize,
    /// `true` if `max_pushes` stopped the loop before the threshold was met.
    pub capped: bool,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForwardPushConfig {
    /// Per-step stop probability, in \((0,1)\).
    pub alpha: f64,
    /// Residual threshold per unit of out-weight, `>= f64::MIN_POSITIVE`.
    pub threshold: f64,
    /// Optional cap on the number of pushes, `> 0`.
    pub max_pushes: Option<usize>,
}

impl Default for ForwardPushConfig {
    fn default() -> Self {
        Self {
            alpha: 0.15,
            threshold: 1e-6,
            max_pushes: None,
        }
    }
}

impl ForwardPushConfig {
    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        if !self.threshold.is_finite() || self.threshold < f64::MIN_POSITIVE {
            return Err(Error::InvalidArgument(format!(
                "threshold must be finite and >= f64::MIN_POSITIVE (threshold={:e})",
                self.threshold
            )));
        }
        if self.max_pushes == Some(0) {
            return Err(Error::InvalidArgument(
                "max_pushes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Step-wise forward push over a borrowed [`OutAdjacency`].
///
/// [`forward_push`] and [`forward_push_run`] drive this to completion; it is
/// public so callers can observe or interleave individual pushes.
#[derive(Debug)]
pub struct ForwardPush<'a> {
    adjacency: &'a OutAdjacency,
    alpha: f64,
    threshold: f64,
    reserve: Vec<f64>,
    residue: Vec<f64>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
    pushes: usize,
}

impl<'a> ForwardPush<'a> {
    pub fn new(
        adjacency: &'a OutAdjacency,
        source: &[f64],
        config: ForwardPushConfig,
    ) -> Result<Self> {
        config.validate()?;
        let n = adjacency.node_count();
        validate_source(source, n)?;

        let mut engine = Self {
            adjacency,
            alpha: config.alpha,
            threshold: config.threshold,
            reserve: vec![0.0; n],
            residue: source.to_vec(),
            queue: VecDeque::new(),
            queued: vec![false; n],
            pushes: 0,
        };
        for u in 0..n {
            engine.enqueue_if_active(u);
        }
        Ok(engine)
    }

    /// `residue[u]` per unit of out-weight (the raw residue for dangling nodes).
    pub fn normalized_residue(&self, u: usize) -> f64 {
        let wsum = self.adjacency.out_weight_sum(u);
        if wsum > 0.0 {
            self.residue[u] / wsum
        } else {
            self.residue[u]
        }
    }

    fn enqueue_if_active(&mut self, u: usize) {
        if !self.queued[u] && self.normalized_residue(u) > self.threshold {
            self.queued[u] = true;
            self.queue.push_back(u);
        }
    }

    /// Performs one push; returns the pushed node, or `None` once no node is
    /// above the threshold.
    pub fn push_once(&mut self) -> Option<usize> {
        while let Some(u) = self.queue.pop_front() {
            self.queued[u] = false;
            if self.normalized_residue(u) <= self.threshold {
                continue;
            }
            let r = std::mem::take(&mut self.residue[u]);
            self.pushes += 1;

            let kept = self.alpha * r;
            // Subnormal residue: nothing would be kept, so settle it whole.
            if self.adjacency.is_dangling(u) || kept == 0.0 {
                self.reserve[u] += r;
                return Some(u);
            }

            self.reserve[u] += kept;
            let spread = (1.0 - self.alpha) * r / self.adjacency.out_weight_sum(u);
            for (v, w) in self.adjacency.edges(u) {
                self.residue[v] += spread * w;
                self.enqueue_if_active(v);
            }
            return Some(u);
        }
        None
    }

    /// Pushes until every normalized residue is `<= threshold`, or until
    /// `max_pushes` pushes have been done in total. Returns `true` if capped.
    pub fn run(&mut self, max_pushes: Option<usize>) -> bool {
        loop {
            if let Some(cap) = max_pushes {
                if self.pushes >= cap {
                    return !self.queue.is_empty();
                }
            }
            if self.push_once().is_none() {
                return false;
            }
        }
    }

    pub fn reserve(&self) -> &[f64] {
        &self.reserve
    }

    pub fn residue(&self) -> &[f64] {
        &self.residue
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.reserve, self.residue)
    }
}

/// Forward push with default settings besides `alpha` and `thr`.
///
/// Returns `(reserve, residue)`.
pub fn forward_push<G: GraphView + ?Sized>(
    graph: &G,
    source: &[f64],
    alpha: f64,
    thr: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let config = ForwardPushConfig {
        alpha,
        threshold: thr,
        ..ForwardPushConfig::default()
    };
    let run = forward_push_run(graph, source, config)?;
    Ok((run.reserve, run.residue))
}

/// Forward push with push-count reporting.
pub fn forward_push_run<G: GraphView + ?Sized>(
    graph: &G,
    source: &[f64],
    config: ForwardPushConfig,
) -> Result<PushRun> {
    config.validate()?;
    validate_source(source, graph.node_count())?;
    let adjacency = OutAdjacency::from_graph(graph)?;
    push_with(&adjacency, source, config)
}

/// Runs forward push over an existing snapshot (shared with FORA).
pub(crate) fn push_with(
    adjacency: &OutAdjacency,
    source: &[f64],
    config: ForwardPushConfig,
) -> Result<PushRun> {
    let mut engine = ForwardPush::new(adjacency, source, config)?;
    log::debug!(
        "forward push: n={} edges={} alpha={} threshold={:e}",
        adjacency.node_count(),
        adjacency.edge_count(),
        config.alpha,
        config.threshold
    );
    let capped = engine.run(config.max_pushes);
    let pushes = engine.pushes();
    if capped {
        log::warn!(
            "forward push stopped at max_pushes={} with residue above threshold",
            pushes
        );
    } else {
        log::debug!("forward push: converged after {} pushes", pushes);
    }
    let (reserve, residue) = engine.into_parts();
    Ok(PushRun {
        reserve,
        residue,
        pushes,
        capped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AdjacencyList, AdjacencyMatrix};
    use proptest::prelude::*;

    fn cycle3() -> AdjacencyList {
        AdjacencyList::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)]).unwrap()
    }

    fn total(run: &PushRun) -> f64 {
        run.reserve.iter().sum::<f64>() + run.residue.iter().sum::<f64>()
    }

    #[test]
    fn rejects_wrong_len() {
        let g = cycle3();
        let err = forward_push(&g, &[1.0], 0.15, 1e-6).unwrap_err();
        assert!(format!("{err}").contains("source length"));
    }

    #[test]
    fn rejects_bad_threshold_and_alpha() {
        let g = cycle3();
        let s = [1.0, 0.0, 0.0];
        assert!(matches!(
            forward_push(&g, &s, 0.15, 0.0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            forward_push(&g, &s, 0.15, -1.0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            forward_push(&g, &s, 1.0, 1e-3),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            forward_push(&g, &[-1.0, 0.0, 0.0], 0.15, 1e-3),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn cycle_converges_to_geometric_ppr() {
        // PPR from 0 on a 3-cycle: pi(k) = alpha * (1-alpha)^k / (1 - (1-alpha)^3).
        let g = cycle3();
        let alpha = 0.15;
        let (reserve, _) = forward_push(&g, &[1.0, 0.0, 0.0], alpha, 1e-12).unwrap();
        let q: f64 = 1.0 - alpha;
        let denom = 1.0 - q.powi(3);
        for (k, &r) in reserve.iter().enumerate() {
            let expected = alpha * q.powi(k as i32) / denom;
            assert!((r - expected).abs() < 1e-9, "k={k} r={r} expected={expected}");
        }
    }

    #[test]
    fn dangling_node_settles_in_reserve() {
        // 0 -> 1, 1 dangling
        let adj = vec![vec![0.0, 1.0], vec![0.0, 0.0]];
        let g = AdjacencyMatrix(&adj);
        let (reserve, residue) = forward_push(&g, &[1.0, 0.0], 0.2, 1e-9).unwrap();
        assert!((reserve[0] - 0.2).abs() < 1e-12);
        assert!((reserve[1] - 0.8).abs() < 1e-12);
        assert!(residue.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn every_step_conserves_mass() {
        let g = AdjacencyList::from_edges(
            4,
            &[(0, 1, 2.0), (0, 2, 1.0), (1, 2, 1.0), (2, 0, 1.0), (2, 3, 3.0), (1, 1, 1.0)],
        )
        .unwrap();
        let out = OutAdjacency::from_graph(&g).unwrap();
        let source = [0.5, 0.0, 1.5, 0.25];
        let expected: f64 = source.iter().sum();
        let config = ForwardPushConfig {
            alpha: 0.3,
            threshold: 1e-8,
            max_pushes: None,
        };
        let mut engine = ForwardPush::new(&out, &source, config).unwrap();
        while engine.push_once().is_some() {
            let sum: f64 =
                engine.reserve().iter().sum::<f64>() + engine.residue().iter().sum::<f64>();
            assert!((sum - expected).abs() < 1e-10, "sum={sum}");
        }
        for u in 0..4 {
            assert!(engine.normalized_residue(u) <= 1e-8);
        }
    }

    #[test]
    fn rejects_subnormal_threshold_and_zero_cap() {
        let g = cycle3();
        let config = ForwardPushConfig {
            alpha: 0.15,
            threshold: f64::from_bits(1),
            max_pushes: None,
        };
        let err = forward_push_run(&g, &[1.0, 0.0, 0.0], config).unwrap_err();
        assert!(format!("{err}").contains("threshold"), "{err}");

        let config = ForwardPushConfig {
            max_pushes: Some(0),
            ..ForwardPushConfig::default()
        };
        let err = forward_push_run(&g, &[1.0, 0.0, 0.0], config).unwrap_err();
        assert!(format!("{err}").contains("max_pushes"), "{err}");
    }

    #[test]
    fn subnormal_residue_settles_instead_of_cycling() {
        // Tiny weights keep the normalized residue above the threshold long after
        // the raw residue has gone subnormal.
        let g = AdjacencyList::from_edges(3, &[(0, 1, 1e-300), (1, 2, 1e-300), (2, 0, 1e-300)])
            .unwrap();
        let config = ForwardPushConfig {
            alpha: 0.15,
            threshold: f64::MIN_POSITIVE,
            max_pushes: Some(1_000_000),
        };
        let run = forward_push_run(&g, &[1e-300, 0.0, 0.0], config).unwrap();
        assert!(!run.capped, "pushes={}", run.pushes);
        assert!(run.residue.iter().all(|&r| r == 0.0), "{:?}", run.residue);
        assert!((total(&run) / 1e-300 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cap_stops_early_and_conserves_mass() {
        let g = cycle3();
        let config = ForwardPushConfig {
            alpha: 0.15,
            threshold: 1e-12,
            max_pushes: Some(5),
        };
        let run = forward_push_run(&g, &[1.0, 0.0, 0.0], config).unwrap();
        assert!(run.capped);
        assert_eq!(run.pushes, 5);
        assert!((total(&run) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let g = cycle3();
        let a = forward_push(&g, &[0.2, 0.3, 0.5], 0.15, 1e-7).unwrap();
        let b = forward_push(&g, &[0.2, 0.3, 0.5], 0.15, 1e-7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_graph_yields_empty_vectors() {
        let g = AdjacencyList::default();
        let (reserve, residue) = forward_push(&g, &[], 0.15, 1e-6).unwrap();
        assert!(reserve.is_empty() && residue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_mass_conserved_and_threshold_met(
            n in 1usize..10,
            edges in proptest::collection::vec((0usize..10, 0usize..10, 1u8..8), 0..40),
            source in proptest::collection::vec(0.0f64..2.0, 10),
            alpha in 0.05f64..0.95,
            thr_exp in 2i32..9,
        ) {
            let edges: Vec<(usize, usize, f64)> = edges
                .into_iter()
                .filter(|&(u, v, _)| u < n && v < n)
                .map(|(u, v, w)| (u, v, w as f64))
                .collect();
            let g = AdjacencyList::from_edges(n, &edges).unwrap();
            let source = &source[..n];
            let thr = 10f64.powi(-thr_exp);
            let config = ForwardPushConfig { alpha, threshold: thr, max_pushes: None };
            let run = forward_push_run(&g, source, config).unwrap();

            let expected: f64 = source.iter().sum();
            prop_assert!((total(&run) - expected).abs() < 1e-9, "total={} expected={}", total(&run), expected);
            prop_assert!(!run.capped);
            let out = OutAdjacency::from_graph(&g).unwrap();
            for u in 0..n {
                let wsum = out.out_weight_sum(u);
                let norm = if wsum > 0.0 { run.residue[u] / wsum } else { run.residue[u] };
                prop_assert!(norm <= thr, "u={} norm={} thr={}", u, norm, thr);
                prop_assert!(run.reserve[u] >= 0.0);
            }
        }
    }
}
