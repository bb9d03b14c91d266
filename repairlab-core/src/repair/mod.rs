//! Price-series repair: five correctors chained in a fixed pipeline.
//!
//! Every corrector implements [`Corrector`]: it takes an owned bar buffer,
//! returns the buffer for the next stage, and never fails. A corrector whose
//! preconditions are not met returns its input untouched. Each also exposes a
//! read-only `analyze` that reports what it would find.
//!
//! Pipeline order (see [`Repairer`]):
//! dividends → unit mixups → splits → zeroes → capital gains.

pub mod capital_gains;
pub mod dividends;
pub mod pipeline;
pub mod splits;
pub mod unit_mixup;
pub mod zeroes;

pub use capital_gains::{CapitalGainsCorrector, CapitalGainsReport};
pub use dividends::{DividendCorrector, DividendDefect, DividendReport};
pub use pipeline::{RepairAnalysis, RepairSummary, Repairer, StageSummary};
pub use splits::{SplitCorrector, SplitReport};
pub use unit_mixup::{UnitMixupCorrector, UnitMixupReport};
pub use zeroes::{ZeroReport, ZeroValueRepairer};

use crate::domain::{Bar, RepairOptions};
use serde::{Deserialize, Serialize};

/// One stage of the repair pipeline.
///
/// # Contract
/// - `apply` returns a sequence of the same length as its input.
/// - `apply` sets `repaired = true` on every bar it changes and on no other.
/// - `analyze` never mutates anything.
pub trait Corrector: Send + Sync {
    /// Stage name used in logs and summaries (e.g., "dividends").
    fn name(&self) -> &str;

    /// Whether the options switch this stage on.
    fn enabled(&self, options: &RepairOptions) -> bool;

    /// Run the stage on an owned buffer and hand the buffer to the next stage.
    fn apply(&self, bars: Vec<Bar>, options: &RepairOptions) -> Vec<Bar>;

    /// Diagnostic counts for this stage over `bars`.
    fn analyze(&self, bars: &[Bar], options: &RepairOptions) -> CorrectorReport;
}

/// Why a stage did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer bars than the stage needs.
    InsufficientData,
    /// Weekly/monthly bars hide the ex-date drop.
    IntervalTooCoarse,
    /// Capital gains present; dividend repair defers to the capital-gains stage.
    HasCapitalGains,
    /// Capital-gains repair only applies to ETFs and mutual funds.
    NotAFund,
    /// Nothing for the stage to look at.
    NoEvents,
    /// The unit divisor is indistinguishable from normal volatility.
    DivisorIndistinguishable,
    /// More than half the series is zero; not enough good bars to calibrate.
    TooManyZeroes,
}

/// Diagnostic report of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CorrectorReport {
    Dividends(DividendReport),
    UnitMixups(UnitMixupReport),
    Splits(SplitReport),
    Zeroes(ZeroReport),
    CapitalGains(CapitalGainsReport),
}

impl CorrectorReport {
    /// Number of defects the stage would repair.
    pub fn defect_count(&self) -> usize {
        match self {
            CorrectorReport::Dividends(r) => {
                r.missing_adjustment + r.too_small + r.too_large + r.phantom
            }
            CorrectorReport::UnitMixups(r) => r.partial_mixups + r.switch_points + r.random_mixups,
            CorrectorReport::Splits(r) => r.unadjusted_events,
            CorrectorReport::Zeroes(r) => r.repairable,
            CorrectorReport::CapitalGains(r) => {
                if r.will_fix {
                    r.double_counted
                } else {
                    0
                }
            }
        }
    }
}

/// Multiply `adj_close` of every bar before `end` by `factor` and flag them.
pub(crate) fn scale_adj_close_before(bars: &mut [Bar], end: usize, factor: f64) {
    for bar in &mut bars[..end] {
        bar.adj_close *= factor;
        bar.repaired = true;
    }
}

/// Adjustment ratio currently applied across the `index - 1 → index` boundary:
/// `adj_factor(prev) / adj_factor(curr)`.
pub(crate) fn applied_ratio(bars: &[Bar], index: usize) -> Option<f64> {
    if index == 0 {
        return None;
    }
    let prev = bars[index - 1].adj_factor()?;
    let curr = bars[index].adj_factor()?;
    crate::stats::safe_ratio(prev, curr)
}
