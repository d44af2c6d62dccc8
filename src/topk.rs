//! Ranking helpers over score vectors.

/// The `k` highest-scoring nodes as `(node, score)`, best first.
///
/// Ties are broken by smaller node id; NaN scores sort last.
pub fn top_k(scores: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    let by_score = |a: &(usize, f64), b: &(usize, f64)| {
        match (a.1.is_nan(), b.1.is_nan()) {
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            _ => b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)),
        }
    };
    if k < ranked.len() {
        ranked.select_nth_unstable_by(k, by_score);
        ranked.truncate(k);
    }
    ranked.sort_by(by_score);
    ranked
}

/// Scales `scores` to sum to 1. All-zero (or empty) input is returned unchanged.
pub fn normalize(scores: &[f64]) -> Vec<f64> {
    let sum: f64 = scores.iter().sum();
    if sum > 0.0 {
        scores.iter().map(|&x| x / sum).collect()
    } else {
        scores.to_vec()
    }
}
