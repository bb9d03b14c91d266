//! Zero/NaN price bars.
//!
//! A zero bar is only filled when something says the market actually traded
//! (volume, a corporate action, or a continuous price across the gap).
//! Otherwise it is more likely a halt and is left alone.

use super::{Corrector, CorrectorReport, SkipReason};
use crate::domain::{Bar, RepairOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MIN_BARS: usize = 2;

/// Abort when more than this fraction of the series is zero.
const MAX_ZERO_FRACTION: f64 = 0.5;

/// Prior close and next open closer than this (relative) imply a data gap.
const CONTINUITY_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZeroReport {
    pub zero_bars: usize,
    pub repairable: usize,
    pub aborted: bool,
    pub skipped_reason: Option<SkipReason>,
}

/// How a zero bar gets its prices back.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Fill {
    /// Both neighbours valid: synthesize from prior close and next open.
    Interpolate { prev: usize, next: usize },
    /// Copy prices from the previous valid bar.
    Forward(usize),
    /// Copy prices from the next valid bar.
    Backward(usize),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroValueRepairer;

impl ZeroValueRepairer {
    pub fn new() -> Self {
        Self
    }

    fn too_many_zeroes(zero_count: usize, len: usize) -> bool {
        zero_count as f64 > MAX_ZERO_FRACTION * len as f64
    }

    fn traded(bars: &[Bar], index: usize, prev: Option<usize>, next: Option<usize>) -> bool {
        let bar = &bars[index];
        if bar.volume > 0 || bar.has_split() || bar.has_dividend() {
            return true;
        }
        match (prev, next) {
            (Some(p), Some(n)) => {
                let prev_close = bars[p].close;
                let next_open = bars[n].open;
                prev_close > 0.0
                    && ((next_open - prev_close) / prev_close).abs() < CONTINUITY_TOLERANCE
            }
            _ => false,
        }
    }

    /// Fill plan for every zero bar that can be repaired.
    fn plan(bars: &[Bar]) -> Vec<(usize, Fill)> {
        let valid: Vec<bool> = bars.iter().map(|b| !b.has_zero_price()).collect();
        let mut plan = Vec::new();
        for index in (0..bars.len()).filter(|&i| !valid[i]) {
            let prev = (0..index).rev().find(|&j| valid[j]);
            let next = (index + 1..bars.len()).find(|&j| valid[j]);
            if !Self::traded(bars, index, prev, next) {
                continue;
            }
            let fill = match (prev, next) {
                (Some(prev), Some(next)) => Fill::Interpolate { prev, next },
                (Some(prev), None) => Fill::Forward(prev),
                (None, Some(next)) => Fill::Backward(next),
                (None, None) => continue,
            };
            plan.push((index, fill));
        }
        plan
    }

    /// Adjustment factor for a bar filled between `prev` and `next`. An action
    /// adjusts only the bars before it, so the next bar's factor holds unless
    /// an action sits in `(index, next]`; then the previous bar's does.
    fn borrowed_factor(source: &[Bar], index: usize, prev: usize, next: usize) -> f64 {
        let from_next = if source[index + 1..=next].iter().any(Bar::has_corporate_action) {
            None
        } else {
            source[next].adj_factor()
        };
        from_next
            .or_else(|| source[prev].adj_factor())
            .unwrap_or(1.0)
    }

    fn fill(source: &[Bar], index: usize, target: &mut Bar, fill: Fill) {
        match fill {
            Fill::Interpolate { prev, next } => {
                let prev_close = source[prev].close;
                let next_open = source[next].open;
                let mid = (prev_close + next_open) / 2.0;
                target.open = mid;
                target.close = mid;
                target.high = prev_close.max(next_open);
                target.low = prev_close.min(next_open);
                target.adj_close = mid * Self::borrowed_factor(source, index, prev, next);
            }
            Fill::Forward(from) | Fill::Backward(from) => {
                let src = &source[from];
                target.open = src.open;
                target.high = src.high;
                target.low = src.low;
                target.close = src.close;
                target.adj_close = src.adj_close;
            }
        }
        target.repaired = true;
    }
}

impl Corrector for ZeroValueRepairer {
    fn name(&self) -> &str {
        "zeroes"
    }

    fn enabled(&self, options: &RepairOptions) -> bool {
        options.toggles.zeroes
    }

    fn apply(&self, bars: Vec<Bar>, options: &RepairOptions) -> Vec<Bar> {
        if bars.len() < MIN_BARS {
            return bars;
        }
        let zero_count = bars.iter().filter(|b| b.has_zero_price()).count();
        if zero_count == 0 {
            return bars;
        }
        if Self::too_many_zeroes(zero_count, bars.len()) {
            warn!(
                ticker = options.label(),
                zero_count,
                bars = bars.len(),
                "too many zero bars to repair"
            );
            return bars;
        }

        let plan = Self::plan(&bars);
        let mut out = bars.clone();
        for &(index, fill) in &plan {
            debug!(ticker = options.label(), date = %bars[index].date, ?fill, "zero bar filled");
            Self::fill(&bars, index, &mut out[index], fill);
        }
        out
    }

    fn analyze(&self, bars: &[Bar], _options: &RepairOptions) -> CorrectorReport {
        let mut report = ZeroReport::default();
        if bars.len() < MIN_BARS {
            report.skipped_reason = Some(SkipReason::InsufficientData);
            return CorrectorReport::Zeroes(report);
        }
        report.zero_bars = bars.iter().filter(|b| b.has_zero_price()).count();
        if Self::too_many_zeroes(report.zero_bars, bars.len()) {
            report.aborted = true;
            report.skipped_reason = Some(SkipReason::TooManyZeroes);
            return CorrectorReport::Zeroes(report);
        }
        report.repairable = Self::plan(bars).len();
        CorrectorReport::Zeroes(report)
    }
}
