//! One OHLCV record plus the corporate actions recorded on it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single interval.
///
/// `adj_close / close` is the cumulative adjustment factor of every dividend,
/// split and capital-gains distribution that happens after this bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
    /// Cash distribution paid on this bar (0 if none).
    #[serde(default)]
    pub dividends: f64,
    /// Split multiplier: 0 or 1 = none, >1 forward split, (0,1) reverse split.
    #[serde(default)]
    pub splits: f64,
    /// Fund capital-gains distribution (0 if none).
    #[serde(default)]
    pub capital_gains: f64,
    /// Set by any corrector that changed this bar.
    #[serde(default)]
    pub repaired: bool,
}

impl Bar {
    /// Plain bar with `adj_close == close` and no corporate actions.
    pub fn new(date: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            adj_close: close,
            volume,
            dividends: 0.0,
            splits: 0.0,
            capital_gains: 0.0,
            repaired: false,
        }
    }

    /// Returns true if any OHLC or adjusted close field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.adj_close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// A bar is "zero" when any of open/high/low/close is zero or NaN.
    pub fn has_zero_price(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .any(|v| *v == 0.0 || v.is_nan())
    }

    pub fn ohlc(&self) -> [f64; 4] {
        [self.open, self.high, self.low, self.close]
    }

    /// Median of the positive OHLC values; `None` when nothing is usable.
    pub fn mid_price(&self) -> Option<f64> {
        let values: Vec<f64> = self
            .ohlc()
            .into_iter()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(crate::stats::median(&values))
    }

    /// `adj_close / close`, when both are finite and close is nonzero.
    pub fn adj_factor(&self) -> Option<f64> {
        if self.close == 0.0 || !self.close.is_finite() || !self.adj_close.is_finite() {
            return None;
        }
        Some(self.adj_close / self.close)
    }

    pub fn has_split(&self) -> bool {
        self.splits != 0.0 && self.splits != 1.0 && self.splits.is_finite()
    }

    pub fn has_dividend(&self) -> bool {
        self.dividends > 0.0
    }

    pub fn has_capital_gains(&self) -> bool {
        self.capital_gains > 0.0
    }

    /// Any corporate action recorded on this bar.
    pub fn has_corporate_action(&self) -> bool {
        self.has_split() || self.has_dividend() || self.has_capital_gains()
    }

    /// Multiply every price field by `factor` and divide volume by it.
    pub(crate) fn scale_prices(&mut self, factor: f64) {
        self.open *= factor;
        self.high *= factor;
        self.low *= factor;
        self.close *= factor;
        self.adj_close *= factor;
        self.volume = (self.volume as f64 / factor).round() as u64;
    }
}

#[cfg(test)]
pub(crate) fn day(offset: i64) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar::new(day(0), 100.0, 105.0, 98.0, 103.0, 50_000)
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
        assert!(bar.has_zero_price());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0; // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn mid_price_ignores_zeroes() {
        let mut bar = sample_bar();
        assert_eq!(bar.mid_price(), Some(101.5));
        bar.high = 0.0;
        assert_eq!(bar.mid_price(), Some(100.0));
        bar.open = 0.0;
        bar.low = 0.0;
        bar.close = 0.0;
        assert_eq!(bar.mid_price(), None);
    }

    #[test]
    fn adj_factor_guards_zero_close() {
        let mut bar = sample_bar();
        bar.adj_close = 51.5;
        assert_eq!(bar.adj_factor(), Some(0.5));
        bar.close = 0.0;
        assert_eq!(bar.adj_factor(), None);
    }

    #[test]
    fn split_marker_semantics() {
        let mut bar = sample_bar();
        assert!(!bar.has_split());
        bar.splits = 1.0;
        assert!(!bar.has_split());
        bar.splits = 0.25;
        assert!(bar.has_split());
    }

    #[test]
    fn scale_prices_moves_volume_inversely() {
        let mut bar = sample_bar();
        bar.scale_prices(0.5);
        assert_eq!(bar.close, 51.5);
        assert_eq!(bar.adj_close, 51.5);
        assert_eq!(bar.volume, 100_000);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let mut bar = sample_bar();
        bar.dividends = 0.25;
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
