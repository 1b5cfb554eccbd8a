//! Sample statistics shared across the analysis pipeline.
//!
//! All functions operate on plain `f64` slices of present values; callers
//! are expected to filter missing metrics out before calling. Empty input
//! yields `None` rather than NaN so that absence stays explicit.

use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Statistics::mean(values))
    }
}

/// Sample standard deviation (n − 1 denominator), `None` below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        None
    } else {
        Some(Statistics::std_dev(values))
    }
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped to [0, 1]. The index is `q * (n - 1)` on the ascending
/// sorted sample, interpolating between the surrounding order statistics.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let q = q.clamp(0.0, 1.0);
    let idx = q * (sorted.len().saturating_sub(1)) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        let t = idx - lo as f64;
        Some(sorted[lo] * (1.0 - t) + sorted[hi] * t)
    }
}

/// Median, `None` for an empty sample.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Minimum, `None` for an empty sample.
pub fn min(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

/// Maximum, `None` for an empty sample.
pub fn max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

/// The `count` smallest values in ascending order.
pub fn smallest(values: &[f64], count: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted.truncate(count);
    sorted
}

/// Trailing rolling median: element `i` is the median of the up-to-`window`
/// values ending at `i`. A partial leading window is allowed.
pub fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            median(&values[start..=i]).unwrap_or(f64::NAN)
        })
        .collect()
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0]), Some(4.0));
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn test_quantile_interpolates_linearly() {
        // idx = 0.1 * 19 = 1.9 over 50,52,..,70
        let values: Vec<f64> = (0..20).map(|i| 50.0 + 2.0 * i as f64).collect();
        let p10 = quantile(&values, 0.1).unwrap();
        assert!((p10 - 53.8).abs() < 1e-9);

        assert_eq!(quantile(&values, 0.0), Some(50.0));
        assert_eq!(quantile(&values, 1.0), Some(70.0));
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(&[42.0], 0.1), Some(42.0));
        assert_eq!(quantile(&[42.0], 0.9), Some(42.0));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_min_max() {
        let values = [3.0, 1.0, 2.0];
        assert_eq!(min(&values), Some(1.0));
        assert_eq!(max(&values), Some(3.0));
        assert_eq!(min(&[]), None);
        assert_eq!(max(&[]), None);
    }

    #[test]
    fn test_smallest_sorts_and_truncates() {
        let values = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(smallest(&values, 2), vec![1.0, 2.0]);
        assert_eq!(smallest(&values, 10).len(), 5);
    }

    #[test]
    fn test_rolling_median_partial_leading_window() {
        let values = [10.0, 20.0, 30.0, 40.0];
        let rolled = rolling_median(&values, 3);
        assert_eq!(rolled, vec![10.0, 15.0, 20.0, 30.0]);
    }

    #[test]
    fn test_std_dev_is_sample_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // population std of this set is 2.0; sample std is slightly larger
        let sd = std_dev(&values).unwrap();
        assert!((sd - 2.13809).abs() < 1e-4);
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round1(71.2499), 71.2);
        assert_eq!(round1(71.25), 71.3);
        assert_eq!(round2(0.8571), 0.86);
    }
}
