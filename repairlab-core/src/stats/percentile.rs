//! Percentiles and interquartile-range outlier bounds.

/// Multiplier applied to the IQR when fencing outliers.
pub const IQR_FENCE: f64 = 1.5;

/// Percentile `p` (0..=100) with linear interpolation between closest ranks.
///
/// Matches numpy's default ("linear") method: rank = p/100 * (n - 1).
pub fn percentile(data: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() || p.is_nan() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl Quartiles {
    pub fn lower_fence(&self) -> f64 {
        self.q1 - IQR_FENCE * self.iqr
    }

    pub fn upper_fence(&self) -> f64 {
        self.q3 + IQR_FENCE * self.iqr
    }

    /// Inside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_fence() && value <= self.upper_fence()
    }
}

/// Returns `(q1, q3, iqr)` as a `Quartiles`.
pub fn iqr(data: &[f64]) -> Quartiles {
    let q1 = percentile(data, 25.0);
    let q3 = percentile(data, 75.0);
    Quartiles { q1, q3, iqr: q3 - q1 }
}

/// Values within the 1.5·IQR fences. NaN entries are dropped.
pub fn iqr_inliers(data: &[f64]) -> Vec<f64> {
    let quartiles = iqr(data);
    if quartiles.iqr.is_nan() {
        return Vec::new();
    }
    data.iter()
        .copied()
        .filter(|v| !v.is_nan() && quartiles.contains(*v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn percentile_interpolates_linearly() {
        let data = [4.0, 1.0, 3.0, 2.0];
        assert_approx(percentile(&data, 0.0), 1.0, DEFAULT_EPSILON);
        assert_approx(percentile(&data, 25.0), 1.75, DEFAULT_EPSILON);
        assert_approx(percentile(&data, 50.0), 2.5, DEFAULT_EPSILON);
        assert_approx(percentile(&data, 100.0), 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn percentile_empty_is_nan() {
        assert!(percentile(&[], 50.0).is_nan());
        assert!(percentile(&[f64::NAN, f64::NAN], 50.0).is_nan());
    }

    #[test]
    fn iqr_of_small_sample() {
        let q = iqr(&[0.01, 1.0, 1.0, 100.0]);
        assert_approx(q.q1, 0.7525, 1e-12);
        assert_approx(q.q3, 25.75, 1e-12);
        assert_approx(q.iqr, 24.9975, 1e-12);
    }

    #[test]
    fn inliers_drop_outliers() {
        let data = [1.0, 1.01, 0.99, 1.02, 0.98, 100.0, f64::NAN];
        let inliers = iqr_inliers(&data);
        assert_eq!(inliers.len(), 5);
        assert!(!inliers.contains(&100.0));
    }

    #[test]
    fn single_value_is_its_own_inlier() {
        let inliers = iqr_inliers(&[0.25]);
        assert_eq!(inliers, vec![0.25]);
        assert!(iqr_inliers(&[]).is_empty());
    }
}
