//! Weighted random selection by stochastic acceptance.
//!
//! Picks an index with probability proportional to its weight without building a cumulative
//! distribution: draw a uniform candidate, accept it with probability `weight / max`, repeat.
//! Expected rounds are `max / mean(weights)`, so a large gap between the cached maximum and the
//! weights of the non-empty inputs makes rejection expensive. After [`MAX_REJECTIONS`] rounds
//! the draw finishes with a roulette-wheel pass, which yields the same distribution.
//!
//! Reference: Lipowski & Lipowska (2012), "Roulette-wheel selection via stochastic acceptance".

use crate::priority::Priority;
use rand::Rng;

/// Rejected draws tolerated before switching to the roulette wheel.
pub const MAX_REJECTIONS: usize = 1024;

/// Select an index of `weights` with probability proportional to its weight.
///
/// `max` is the acceptance reference. It may exceed every entry of `weights` (the combiner
/// caches the maximum over all registered inputs, including empty ones); entries above it are
/// accepted unconditionally.
///
/// Returns `None` only for an empty slice. When `max` is zero or no entry has positive weight
/// the draw is uniform, since no acceptance probability is defined.
pub fn stochastic_acceptance<R: Rng>(
    weights: &[Priority],
    max: Priority,
    rng: &mut R,
) -> Option<usize> {
    let n = weights.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(0);
    }

    let any_positive = weights.iter().any(|weight| weight.get() > 0.0);
    if max.get() <= 0.0 || !any_positive {
        return Some(rng.random_range(0..n));
    }

    for _ in 0..MAX_REJECTIONS {
        let candidate = rng.random_range(0..n);
        if rng.random_bool(weights[candidate].acceptance(max)) {
            return Some(candidate);
        }
    }

    Some(roulette(weights, rng))
}

/// Cumulative-sum selection over positive weights.
///
/// Weights are scaled by the largest one first so the running sum stays finite even for
/// weights near `f64::MAX`.
fn roulette<R: Rng>(weights: &[Priority], rng: &mut R) -> usize {
    let largest = weights
        .iter()
        .fold(Priority::ZERO, |max, weight| max.max(*weight));
    let scaled = |weight: &Priority| weight.acceptance(largest);
    let total: f64 = weights.iter().map(scaled).sum();
    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (index, weight) in weights.iter().enumerate() {
        let share = scaled(weight);
        if share <= 0.0 {
            continue;
        }
        cumulative += share;
        last_positive = index;
        if cumulative > threshold {
            return index;
        }
    }
    last_positive // floating-point fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn weights(raw: &[f64]) -> Vec<Priority> {
        raw.iter().map(|&w| Priority::new(w).unwrap()).collect()
    }

    fn histogram(raw: &[f64], max: f64, draws: usize, seed: u64) -> Vec<usize> {
        let weights = weights(raw);
        let max = Priority::new(max).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = vec![0; weights.len()];
        for _ in 0..draws {
            let index = stochastic_acceptance(&weights, max, &mut rng).unwrap();
            counts[index] += 1;
        }
        counts
    }

    #[test]
    fn empty_slice_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(stochastic_acceptance(&[], Priority::ZERO, &mut rng), None);
    }

    #[test]
    fn frequencies_follow_weights() {
        let counts = histogram(&[8.0, 2.0], 8.0, 20_000, 7);
        let share = counts[0] as f64 / 20_000.0;
        assert!((share - 0.8).abs() < 0.02, "share was {share}");
    }

    #[test]
    fn zero_max_falls_back_to_uniform() {
        let counts = histogram(&[0.0, 0.0, 0.0], 0.0, 9_000, 3);
        for count in counts {
            assert!((2_500..3_500).contains(&count), "count was {count}");
        }
    }

    #[test]
    fn all_zero_candidates_with_positive_max_terminate() {
        // A heavy input that is currently empty must not stall zero-weight ones.
        let counts = histogram(&[0.0, 0.0], 5.0, 1_000, 11);
        assert_eq!(counts.iter().sum::<usize>(), 1_000);
        assert!(counts.iter().all(|&count| count > 0));
    }

    #[test]
    fn zero_weight_loses_to_positive_weight() {
        let counts = histogram(&[0.0, 1.0], 1.0, 1_000, 5);
        assert_eq!(counts, vec![0, 1_000]);
    }

    #[test]
    fn extreme_spread_still_terminates_with_correct_bias() {
        // Acceptance probability of 1e-6 forces the roulette fallback on nearly every draw.
        let counts = histogram(&[1e-6, 3e-6], 1.0, 2_000, 13);
        let share = counts[1] as f64 / 2_000.0;
        assert!((share - 0.75).abs() < 0.05, "share was {share}");
    }

    #[test]
    fn roulette_handles_weights_near_f64_max() {
        let mut rng = StdRng::seed_from_u64(19);
        let huge = weights(&[f64::MAX, f64::MAX, f64::MAX / 2.0]);
        let mut counts = [0usize; 3];
        for _ in 0..3_000 {
            counts[roulette(&huge, &mut rng)] += 1;
        }
        assert!(counts.iter().all(|&count| count > 0), "counts were {counts:?}");
        assert!(counts[2] < counts[0] && counts[2] < counts[1], "counts were {counts:?}");
    }

    #[test]
    fn weights_above_max_are_always_accepted() {
        let counts = histogram(&[4.0, 4.0], 2.0, 2_000, 17);
        let share = counts[0] as f64 / 2_000.0;
        assert!((share - 0.5).abs() < 0.05, "share was {share}");
    }
}
