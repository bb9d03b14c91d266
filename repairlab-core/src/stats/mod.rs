//! Numeric helpers every corrector is tuned against.
//!
//! All functions are pure. NaN entries are ignored by the reducing functions
//! (mean, std, median, percentile) and an empty (or all-NaN) input yields NaN.
//! The corrector thresholds depend on the exact tie-breaking here: even-length
//! medians average the two middle values, percentiles interpolate linearly
//! between closest ranks, and filter windows are truncated at the edges.

pub mod median;
pub mod percentile;
pub mod rolling;

pub use median::{median, median_filter_1d, median_filter_2d};
pub use percentile::{iqr, iqr_inliers, percentile, Quartiles};
pub use rolling::{rolling_mean, rolling_std, z_score};

fn finite(data: &[f64]) -> impl Iterator<Item = f64> + '_ {
    data.iter().copied().filter(|v| !v.is_nan())
}

/// Arithmetic mean, ignoring NaN.
pub fn mean(data: &[f64]) -> f64 {
    let (sum, count) = finite(data).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}

/// Population standard deviation (ddof = 0), ignoring NaN.
pub fn std_dev(data: &[f64]) -> f64 {
    let m = mean(data);
    if m.is_nan() {
        return f64::NAN;
    }
    let (sq, count) = finite(data).fold((0.0, 0usize), |(s, c), v| (s + (v - m).powi(2), c + 1));
    (sq / count as f64).sqrt()
}

/// Sample standard deviation (ddof = 1); NaN with fewer than two values.
pub fn sample_std_dev(data: &[f64]) -> f64 {
    let m = mean(data);
    let (sq, count) = finite(data).fold((0.0, 0usize), |(s, c), v| (s + (v - m).powi(2), c + 1));
    if count < 2 {
        return f64::NAN;
    }
    (sq / (count - 1) as f64).sqrt()
}

/// Element-wise absolute value.
pub fn abs_all(data: &[f64]) -> Vec<f64> {
    data.iter().map(|v| v.abs()).collect()
}

/// First difference: `out[i] = data[i + 1] - data[i]`, length `n - 1`.
pub fn diff(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Fractional change `(data[i+1] - data[i]) / data[i]`.
///
/// A zero or NaN denominator produces NaN for that position.
pub fn pct_change(data: &[f64]) -> Vec<f64> {
    data.windows(2)
        .map(|w| {
            if w[0] == 0.0 || w[0].is_nan() {
                f64::NAN
            } else {
                (w[1] - w[0]) / w[0]
            }
        })
        .collect()
}

/// `numerator / denominator`, or `None` for a zero/non-finite denominator.
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    Some(numerator / denominator)
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_ignores_nan() {
        assert_approx(mean(&[1.0, f64::NAN, 3.0]), 2.0, DEFAULT_EPSILON);
        assert!(mean(&[]).is_nan());
        assert!(mean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn std_dev_population_vs_sample() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx(std_dev(&data), 2.0, DEFAULT_EPSILON);
        assert_approx(sample_std_dev(&data), 2.138089935299395, 1e-12);
        assert_approx(std_dev(&[5.0]), 0.0, DEFAULT_EPSILON);
        assert!(sample_std_dev(&[5.0]).is_nan());
    }

    #[test]
    fn diff_and_pct_change() {
        assert_eq!(diff(&[1.0, 4.0, 2.0]), vec![3.0, -2.0]);
        let pct = pct_change(&[100.0, 110.0, 0.0, 5.0]);
        assert_approx(pct[0], 0.1, DEFAULT_EPSILON);
        assert_approx(pct[1], -1.0, DEFAULT_EPSILON);
        assert!(pct[2].is_nan());
        assert!(diff(&[1.0]).is_empty());
    }

    #[test]
    fn abs_and_safe_ratio() {
        assert_eq!(abs_all(&[-1.5, 2.0]), vec![1.5, 2.0]);
        assert_eq!(safe_ratio(1.0, 4.0), Some(0.25));
        assert_eq!(safe_ratio(1.0, 0.0), None);
        assert_eq!(safe_ratio(f64::NAN, 2.0), None);
    }
}
