//! Centered rolling statistics and z-scores.
//!
//! A centered window of size `w` at index `i` covers `[i - w/2, i - w/2 + w)`.
//! Positions whose window would run past either edge are NaN.

use super::{mean, sample_std_dev, std_dev};

fn centered_window(i: usize, len: usize, window: usize) -> Option<(usize, usize)> {
    let half = window / 2;
    let start = i.checked_sub(half)?;
    let end = start + window;
    if end > len {
        return None;
    }
    Some((start, end))
}

/// Centered rolling mean.
pub fn rolling_mean(data: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; data.len()];
    }
    (0..data.len())
        .map(|i| match centered_window(i, data.len(), window) {
            Some((s, e)) => mean(&data[s..e]),
            None => f64::NAN,
        })
        .collect()
}

/// Centered rolling sample standard deviation.
pub fn rolling_std(data: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; data.len()];
    }
    (0..data.len())
        .map(|i| match centered_window(i, data.len(), window) {
            Some((s, e)) => sample_std_dev(&data[s..e]),
            None => f64::NAN,
        })
        .collect()
}

/// Standard score of every element against the whole series.
///
/// A zero spread gives 0 for every finite input; NaN inputs stay NaN.
pub fn z_score(data: &[f64]) -> Vec<f64> {
    let m = mean(data);
    let sd = std_dev(data);
    data.iter()
        .map(|v| {
            if v.is_nan() || m.is_nan() {
                f64::NAN
            } else if sd == 0.0 {
                0.0
            } else {
                (v - m) / sd
            }
        })
        .collect()
}
