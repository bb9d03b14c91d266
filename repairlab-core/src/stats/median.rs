//! Median and edge-clamped median filters.

/// Median ignoring NaN; even counts average the two middle values.
pub fn median(data: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Inclusive index bounds of a window centred on `i`, truncated at the edges.
/// Even windows take the extra element before `i`, as the rolling windows do.
fn window_bounds(i: usize, len: usize, window: usize) -> (usize, usize) {
    let half = window / 2;
    let start = i.saturating_sub(half);
    let end = (i + (window - 1 - half)).min(len - 1);
    (start, end)
}

/// 1-D median filter. Each output is the median of the (truncated) window
/// around that position; NaN entries in the window are ignored.
pub fn median_filter_1d(data: &[f64], window: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let window = window.max(1);
    (0..data.len())
        .map(|i| {
            let (start, end) = window_bounds(i, data.len(), window);
            median(&data[start..=end])
        })
        .collect()
}

/// 2-D median filter over a row-major matrix (rows = bars, columns = fields).
///
/// Rows must all have the same length. The window is `window x window`,
/// truncated at every edge.
pub fn median_filter_2d(data: &[Vec<f64>], window: usize) -> Vec<Vec<f64>> {
    let rows = data.len();
    if rows == 0 {
        return Vec::new();
    }
    let cols = data[0].len();
    let window = window.max(1);

    let mut out = vec![vec![f64::NAN; cols]; rows];
    let mut buf = Vec::with_capacity(window * window);
    for (r, out_row) in out.iter_mut().enumerate() {
        let (r0, r1) = window_bounds(r, rows, window);
        for (c, cell) in out_row.iter_mut().enumerate() {
            let (c0, c1) = window_bounds(c, cols, window);
            buf.clear();
            for row in &data[r0..=r1] {
                buf.extend_from_slice(&row[c0..=c1]);
            }
            *cell = median(&buf);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn median_odd_even() {
        assert_approx(median(&[3.0, 1.0, 2.0]), 2.0, DEFAULT_EPSILON);
        assert_approx(median(&[4.0, 1.0, 3.0, 2.0]), 2.5, DEFAULT_EPSILON);
        assert_approx(median(&[f64::NAN, 5.0]), 5.0, DEFAULT_EPSILON);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn filter_1d_removes_spike() {
        let out = median_filter_1d(&[1.0, 1.0, 100.0, 1.0, 1.0], 3);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn filter_1d_truncates_edges() {
        // Edge window at index 0 is [1, 3] -> 2
        let out = median_filter_1d(&[1.0, 3.0, 5.0], 3);
        assert_approx(out[0], 2.0, DEFAULT_EPSILON);
        assert_approx(out[1], 3.0, DEFAULT_EPSILON);
        assert_approx(out[2], 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn filter_1d_even_window_spans_window_elements() {
        // Window 2 at index 1 is [10, 20], not [10, 20, 30]
        let out = median_filter_1d(&[10.0, 20.0, 30.0], 2);
        assert_approx(out[0], 10.0, DEFAULT_EPSILON);
        assert_approx(out[1], 15.0, DEFAULT_EPSILON);
        assert_approx(out[2], 25.0, DEFAULT_EPSILON);

        // Window 4 at index 2 is [1, 2, 3, 4]
        let out = median_filter_1d(&[1.0, 2.0, 3.0, 4.0, 100.0], 4);
        assert_approx(out[2], 2.5, DEFAULT_EPSILON);
    }

    #[test]
    fn filter_1d_all_nan_window() {
        let out = median_filter_1d(&[f64::NAN, f64::NAN, 2.0], 1);
        assert!(out[0].is_nan());
        assert_approx(out[2], 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn filter_2d_removes_row_spike() {
        let mut data = vec![vec![10.0, 11.0, 9.0]; 5];
        data[2] = vec![1000.0, 1100.0, 900.0];
        let out = median_filter_2d(&data, 3);
        for row in &out {
            for v in row {
                assert!(*v < 20.0, "spike leaked into filter output: {v}");
            }
        }
    }

    #[test]
    fn filter_2d_empty() {
        assert!(median_filter_2d(&[], 3).is_empty());
    }
}
