//! Damped random walks over a [`TransitionTable`], batched into seeded shards.
//!
//! A walk plan is a list of [`WalkBatch`]es. The flattened sequence of walks is cut
//! into shards of [`SHARD_WALKS`] walks; shard `s` draws from its own RNG seeded
//! with `(seed, s)`. Results therefore depend only on the seed and the plan, not on
//! whether shards run serially or (feature `parallel`) on a rayon pool.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::transition::{Step, TransitionTable};

pub(crate) const SHARD_WALKS: u64 = 1 << 16;

/// `count` walks starting at `start` (uniformly random start if `None`), each
/// depositing `weight` at its terminal node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkBatch {
    pub(crate) start: Option<usize>,
    pub(crate) count: u64,
    pub(crate) weight: f64,
}

/// Accumulated terminal weights plus the total number of steps taken.
#[derive(Debug)]
pub(crate) struct WalkTally {
    pub(crate) scores: Vec<f64>,
    pub(crate) steps: u64,
}

/// Walks from `start` until the stop draw; returns `(terminal, steps)`.
///
/// Dangling nodes teleport to a uniformly random node and the walk goes on.
pub(crate) fn walk_from<R: Rng>(
    table: &TransitionTable<'_>,
    start: usize,
    rng: &mut R,
) -> (usize, u64) {
    let n = table.node_count();
    let mut current = start;
    let mut steps = 0u64;
    loop {
        let r: f64 = rng.random();
        match table.step(current, r) {
            Step::Stop => return (current, steps),
            Step::Teleport => current = rng.random_range(0..n),
            Step::Move(next) => current = next,
        }
        steps += 1;
    }
}

fn shard_rng(seed: u64, shard: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ shard.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Runs walks `[from, to)` of the flattened plan into `scores`.
fn run_shard(
    table: &TransitionTable<'_>,
    plan: &[WalkBatch],
    prefix: &[u64],
    from: u64,
    to: u64,
    rng: &mut StdRng,
    scores: &mut [f64],
) -> u64 {
    let n = table.node_count();
    let mut steps = 0u64;
    // prefix[b] is the index of the first walk of batch b.
    let mut b = prefix.partition_point(|&p| p <= from) - 1;
    let mut i = from;
    while i < to {
        let batch = &plan[b];
        let end = (prefix[b] + batch.count).min(to);
        for _ in i..end {
            let start = match batch.start {
                Some(s) => s,
                None => rng.random_range(0..n),
            };
            let (terminal, s) = walk_from(table, start, rng);
            scores[terminal] += batch.weight;
            steps += s;
        }
        i = end;
        b += 1;
    }
    steps
}

fn plan_prefix(plan: &[WalkBatch]) -> (Vec<u64>, u64) {
    let mut prefix = Vec::with_capacity(plan.len());
    let mut total = 0u64;
    for batch in plan {
        prefix.push(total);
        total += batch.count;
    }
    (prefix, total)
}

/// Executes every walk in `plan`.
#[cfg(not(feature = "parallel"))]
pub(crate) fn run_walks(table: &TransitionTable<'_>, plan: &[WalkBatch], seed: u64) -> WalkTally {
    let n = table.node_count();
    let plan: Vec<WalkBatch> = plan.iter().copied().filter(|b| b.count > 0).collect();
    let (prefix, total) = plan_prefix(&plan);
    let mut scores = vec![0.0; n];
    let mut steps = 0u64;
    let shards = total.div_ceil(SHARD_WALKS);
    for shard in 0..shards {
        let from = shard * SHARD_WALKS;
        let to = (from + SHARD_WALKS).min(total);
        let mut rng = shard_rng(seed, shard);
        steps += run_shard(table, &plan, &prefix, from, to, &mut rng, &mut scores);
    }
    WalkTally { scores, steps }
}

/// Executes every walk in `plan`, one rayon task per shard.
#[cfg(feature = "parallel")]
pub(crate) fn run_walks(table: &TransitionTable<'_>, plan: &[WalkBatch], seed: u64) -> WalkTally {
    use rayon::prelude::*;

    let n = table.node_count();
    let plan: Vec<WalkBatch> = plan.iter().copied().filter(|b| b.count > 0).collect();
    let (prefix, total) = plan_prefix(&plan);
    let shards = total.div_ceil(SHARD_WALKS);
    let partials: Vec<(Vec<f64>, u64)> = (0..shards)
        .into_par_iter()
        .map(|shard| {
            let from = shard * SHARD_WALKS;
            let to = (from + SHARD_WALKS).min(total);
            let mut rng = shard_rng(seed, shard);
            let mut local = vec![0.0; n];
            let steps = run_shard(table, &plan, &prefix, from, to, &mut rng, &mut local);
            (local, steps)
        })
        .collect();

    // Merge in shard order so the floating-point sums are reproducible.
    let mut scores = vec![0.0; n];
    let mut steps = 0u64;
    for (local, s) in partials {
        for (acc, x) in scores.iter_mut().zip(local) {
            *acc += x;
        }
        steps += s;
    }
    WalkTally { scores, steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AdjacencyList;
    use crate::transition::OutAdjacency;

    fn cycle3() -> AdjacencyList {
        AdjacencyList::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)]).unwrap()
    }

    #[test]
    fn walks_are_reproducible_by_seed() {
        let g = cycle3();
        let out = OutAdjacency::from_graph(&g).unwrap();
        let table = TransitionTable::new(&out, 0.15);
        let plan = [WalkBatch {
            start: None,
            count: 10_000,
            weight: 1.0,
        }];
        let a = run_walks(&table, &plan, 7);
        let b = run_walks(&table, &plan, 7);
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.steps, b.steps);
    }

    #[test]
    fn every_walk_lands_once() {
        let g = cycle3();
        let out = OutAdjacency::from_graph(&g).unwrap();
        let table = TransitionTable::new(&out, 0.5);
        // Batches straddle a shard boundary.
        let plan = [
            WalkBatch {
                start: Some(0),
                count: SHARD_WALKS - 3,
                weight: 1.0,
            },
            WalkBatch {
                start: Some(1),
                count: 0,
                weight: 1.0,
            },
            WalkBatch {
                start: Some(2),
                count: 10,
                weight: 1.0,
            },
        ];
        let tally = run_walks(&table, &plan, 1);
        let total: f64 = tally.scores.iter().sum();
        assert_eq!(total, (SHARD_WALKS + 7) as f64);
    }

    #[test]
    fn dangling_node_teleports_instead_of_stalling() {
        // 0 -> 1, 1 is dangling
        let g = AdjacencyList::from_edges(2, &[(0, 1, 1.0)]).unwrap();
        let out = OutAdjacency::from_graph(&g).unwrap();
        let table = TransitionTable::new(&out, 0.3);
        let mut rng = StdRng::seed_from_u64(3);
        let mut landed = [0usize; 2];
        for _ in 0..1000 {
            let (terminal, _) = walk_from(&table, 1, &mut rng);
            landed[terminal] += 1;
        }
        assert!(landed[0] > 0, "landed={landed:?}");
        assert!(landed[1] > 0, "landed={landed:?}");
    }
}
