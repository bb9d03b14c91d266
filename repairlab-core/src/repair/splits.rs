//! Unadjusted stock splits.
//!
//! A split bar whose day-over-day move matches the move the split ratio
//! predicts means the history before it was never rescaled. The fix divides
//! every earlier price by the ratio and multiplies volume by it.

use super::{Corrector, CorrectorReport, SkipReason};
use crate::domain::{Bar, RepairOptions};
use crate::stats::{abs_all, iqr_inliers, pct_change, std_dev};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_BARS: usize = 2;

/// Bars before the split used to estimate local noise.
const NOISE_LOOKBACK: usize = 20;

/// The split move must exceed this many noise deviations to be detectable.
const NOISE_SIGMAS: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitReport {
    pub split_events: usize,
    pub unadjusted_events: usize,
    pub skipped_reason: Option<SkipReason>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SplitCorrector;

impl SplitCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Price move a split of ratio `r` produces, measured against the larger
    /// of the two prices: `1 - 1/r` forward, `r - 1` reverse.
    pub fn expected_change(ratio: f64) -> f64 {
        if ratio > 1.0 {
            1.0 - 1.0 / ratio
        } else {
            ratio - 1.0
        }
    }

    /// Observed move across the split bar, in the same convention as
    /// [`expected_change`](Self::expected_change).
    fn actual_change(prev_mid: f64, mid: f64, ratio: f64) -> f64 {
        if ratio > 1.0 {
            (prev_mid - mid) / prev_mid
        } else {
            (prev_mid - mid) / mid
        }
    }

    /// Standard deviation of |daily change| over the IQR-inlier changes of
    /// up to `NOISE_LOOKBACK` bars before `index`.
    fn local_noise(bars: &[Bar], index: usize) -> f64 {
        let start = index.saturating_sub(NOISE_LOOKBACK);
        let mids: Vec<f64> = bars[start..index]
            .iter()
            .map(|b| b.mid_price().unwrap_or(f64::NAN))
            .collect();
        let inliers = iqr_inliers(&pct_change(&mids));
        if inliers.is_empty() {
            return 0.0;
        }
        std_dev(&abs_all(&inliers))
    }

    /// True when the split at `index` is visible in the raw prices.
    fn is_unadjusted(bars: &[Bar], index: usize) -> bool {
        let ratio = bars[index].splits;
        let (Some(prev_mid), Some(mid)) = (bars[index - 1].mid_price(), bars[index].mid_price())
        else {
            return false;
        };

        let expected = Self::expected_change(ratio);
        let noise = NOISE_SIGMAS * Self::local_noise(bars, index);
        if noise >= expected.abs() {
            // Ordinary volatility already spans the split move.
            return false;
        }
        let threshold = (expected.abs() + noise) / 2.0;
        let actual = Self::actual_change(prev_mid, mid, ratio);
        (actual - expected).abs() < threshold
    }

    fn split_indices(bars: &[Bar]) -> Vec<usize> {
        (1..bars.len()).filter(|&i| bars[i].has_split() && bars[i].splits > 0.0).collect()
    }
}

impl Corrector for SplitCorrector {
    fn name(&self) -> &str {
        "splits"
    }

    fn enabled(&self, options: &RepairOptions) -> bool {
        options.toggles.splits
    }

    fn apply(&self, mut bars: Vec<Bar>, options: &RepairOptions) -> Vec<Bar> {
        if bars.len() < MIN_BARS {
            return bars;
        }
        // Oldest first: a corrected early split feeds clean history to the
        // noise window of a later one.
        for index in Self::split_indices(&bars) {
            if !Self::is_unadjusted(&bars, index) {
                continue;
            }
            let ratio = bars[index].splits;
            debug!(
                ticker = options.label(),
                date = %bars[index].date,
                ratio,
                "unadjusted split"
            );
            for bar in &mut bars[..index] {
                bar.scale_prices(1.0 / ratio);
                bar.repaired = true;
            }
            bars[index].repaired = true;
        }
        bars
    }

    fn analyze(&self, bars: &[Bar], _options: &RepairOptions) -> CorrectorReport {
        let mut report = SplitReport::default();
        if bars.len() < MIN_BARS {
            report.skipped_reason = Some(SkipReason::InsufficientData);
            return CorrectorReport::Splits(report);
        }
        let indices = Self::split_indices(bars);
        report.split_events = indices.len();
        if indices.is_empty() {
            report.skipped_reason = Some(SkipReason::NoEvents);
            return CorrectorReport::Splits(report);
        }
        report.unadjusted_events = indices
            .iter()
            .filter(|&&i| Self::is_unadjusted(bars, i))
            .count();
        CorrectorReport::Splits(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::day;
    use crate::repair::fixtures::calm_closes;
    use crate::stats::{assert_approx, DEFAULT_EPSILON};

    fn bar(offset: i64, close: f64) -> Bar {
        Bar::new(day(offset), close, close * 1.01, close * 0.99, close, 1000)
    }

    #[test]
    fn expected_change_forward_and_reverse() {
        assert_approx(SplitCorrector::expected_change(2.0), 0.5, DEFAULT_EPSILON);
        assert_approx(SplitCorrector::expected_change(4.0), 0.75, DEFAULT_EPSILON);
        assert_approx(SplitCorrector::expected_change(0.5), -0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn forward_split_halves_history() {
        let mut bars = vec![bar(0, 200.0), bar(1, 202.0), bar(2, 101.0)];
        bars[2].splits = 2.0;
        let out = SplitCorrector::new().apply(bars, &RepairOptions::default());

        assert_approx(out[0].close, 100.0, DEFAULT_EPSILON);
        assert_approx(out[0].high, 101.0, 1e-9);
        assert_approx(out[1].open, 101.0, DEFAULT_EPSILON);
        assert_approx(out[1].adj_close, 101.0, DEFAULT_EPSILON);
        assert_eq!(out[0].volume, 2000);
        assert_eq!(out[1].volume, 2000);
        assert_eq!(out[2].close, 101.0);
        assert_eq!(out[2].volume, 1000);
        assert!(out.iter().all(|b| b.repaired));
    }

    #[test]
    fn reverse_split_multiplies_history() {
        let mut closes = calm_closes(10, 5.0);
        for c in closes.iter_mut().skip(9) {
            *c *= 10.0;
        }
        let mut bars: Vec<Bar> = closes.iter().enumerate().map(|(i, &c)| bar(i as i64, c)).collect();
        bars[9].splits = 0.1;
        let original = bars.clone();
        let out = SplitCorrector::new().apply(bars, &RepairOptions::default());

        for i in 0..9 {
            assert_approx(out[i].close, original[i].close * 10.0, 1e-9);
            assert_eq!(out[i].volume, 100);
            assert!(out[i].repaired);
        }
        assert!(out[9].repaired);
    }

    #[test]
    fn adjusted_split_is_left_alone() {
        let closes = calm_closes(25, 100.0);
        let mut bars: Vec<Bar> = closes.iter().enumerate().map(|(i, &c)| bar(i as i64, c)).collect();
        bars[20].splits = 2.0;
        let out = SplitCorrector::new().apply(bars.clone(), &RepairOptions::default());
        assert_eq!(out, bars);
    }

    #[test]
    fn split_on_first_bar_is_ignored() {
        let mut bars = vec![bar(0, 100.0), bar(1, 100.0)];
        bars[0].splits = 2.0;
        let out = SplitCorrector::new().apply(bars.clone(), &RepairOptions::default());
        assert_eq!(out, bars);
    }

    #[test]
    fn analyze_reports_unadjusted_split() {
        let mut bars = vec![bar(0, 200.0), bar(1, 202.0), bar(2, 101.0)];
        bars[2].splits = 2.0;
        let report = SplitCorrector::new().analyze(&bars, &RepairOptions::default());
        assert_eq!(
            report,
            CorrectorReport::Splits(SplitReport {
                split_events: 1,
                unadjusted_events: 1,
                skipped_reason: None,
            })
        );
    }
}
