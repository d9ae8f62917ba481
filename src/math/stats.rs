//! Percentile helpers for resampled distributions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Lower one-sigma quantile of a normal distribution.
pub const QUANTILE_16: f64 = 0.16;
pub const QUANTILE_50: f64 = 0.50;
/// Upper one-sigma quantile of a normal distribution.
pub const QUANTILE_84: f64 = 0.84;

/// An asymmetric uncertainty `+up / -down`, both non-negative for sorted input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AsymmetricError {
    pub up: f64,
    pub down: f64,
}

/// Zero-based nearest-rank index for quantile `p` over `n` sorted values.
///
/// The index is `ceil(p * n) - 1`, clamped to `[0, n - 1]`. Returns 0 for `n == 0`.
/// Rounding `p * n` instead can land one index higher: for `n = 101` the 84%
/// quantile sits at index 84 here, not 85.
pub fn nearest_rank_index(p: f64, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let rank = (p * n as f64).ceil() as i64 - 1;
    rank.clamp(0, n as i64 - 1) as usize
}

/// Sort ascending. Values that do not compare (NaN) are treated as equal.
pub fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Nearest-rank quantile of an already sorted slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[nearest_rank_index(p, sorted.len())])
}

/// Median and asymmetric one-sigma band of `values` (sorted in place).
///
/// `up = v84 - v50`, `down = v50 - v16`.
pub fn percentile_band(values: &mut [f64]) -> Option<(f64, AsymmetricError)> {
    if values.is_empty() {
        return None;
    }
    sort_values(values);
    let v16 = quantile_sorted(values, QUANTILE_16)?;
    let v50 = quantile_sorted(values, QUANTILE_50)?;
    let v84 = quantile_sorted(values, QUANTILE_84)?;
    Some((
        v50,
        AsymmetricError {
            up: v84 - v50,
            down: v50 - v16,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nearest_rank_matches_hand_computed_indices() {
        // 101 samples: ceil(16.16) - 1 = 16, ceil(50.5) - 1 = 50, ceil(84.84) - 1 = 84.
        assert_eq!(nearest_rank_index(QUANTILE_16, 101), 16);
        assert_eq!(nearest_rank_index(QUANTILE_50, 101), 50);
        assert_eq!(nearest_rank_index(QUANTILE_84, 101), 84);
    }

    #[test]
    fn nearest_rank_is_clamped() {
        assert_eq!(nearest_rank_index(0.0, 5), 0);
        assert_eq!(nearest_rank_index(1.0, 5), 4);
        assert_eq!(nearest_rank_index(0.84, 1), 0);
        assert_eq!(nearest_rank_index(0.5, 0), 0);
    }

    #[test]
    fn band_of_uniform_grid() {
        let mut values: Vec<f64> = (0..101).rev().map(|i| i as f64).collect();
        let (median, band) = percentile_band(&mut values).unwrap();
        assert_eq!(median, 50.0);
        assert_eq!(band.up, 34.0);
        assert_eq!(band.down, 34.0);
    }

    #[test]
    fn empty_input_has_no_band() {
        assert!(percentile_band(&mut []).is_none());
    }

    proptest! {
        #[test]
        fn percentiles_are_monotone(mut values in prop::collection::vec(-1.0e3f64..1.0e3, 1..200)) {
            let (_, band) = percentile_band(&mut values).unwrap();
            prop_assert!(band.up >= 0.0);
            prop_assert!(band.down >= 0.0);
        }
    }
}
