//! Latency aggregation over a batch of outcomes
//!
//! Pure functions: the same outcome sequence always yields the same
//! aggregates. Percentiles use nearest-rank on a zero-indexed sorted
//! sample - value at floor(p * (len-1)) - with no interpolation.

use crate::types::{Aggregates, RunOutcome};

/// Compute count, mean, min, max and p50/p90/p95 over a batch.
///
/// Only outcomes with a positive duration contribute timing samples;
/// zero-duration outcomes (e.g. rejected requests where start == end) are
/// excluded from timing but still counted in `runs`. With no positive
/// sample every statistic is zero.
pub fn aggregate(outcomes: &[RunOutcome]) -> Aggregates {
    let mut samples: Vec<f64> = outcomes
        .iter()
        .map(|o| o.duration_ms())
        .filter(|ms| *ms > 0.0)
        .collect();
    samples.sort_by(|a, b| a.total_cmp(b));

    if samples.is_empty() {
        return Aggregates::empty(outcomes.len());
    }

    Aggregates {
        runs: outcomes.len(),
        avg_ms: samples.iter().sum::<f64>() / samples.len() as f64,
        min_ms: samples[0],
        max_ms: samples[samples.len() - 1],
        p50_ms: percentile(&samples, 0.50),
        p90_ms: percentile(&samples, 0.90),
        p95_ms: percentile(&samples, 0.95),
    }
}

/// Nearest-rank percentile of an ascending-sorted sample.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let i = (p * (sorted.len() - 1) as f64).floor() as usize;
    sorted[i.min(sorted.len() - 1)]
}
