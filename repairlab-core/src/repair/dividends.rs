//! Bad dividend adjustments.
//!
//! Each dividend event (index > 0) is classified into at most one defect,
//! first match wins:
//!
//! | Defect              | Test                                                        |
//! |---------------------|-------------------------------------------------------------|
//! | `MissingAdjustment` | no adjustment-factor step across the event                  |
//! | `TooSmall`          | div < 0.1% of price and ×divisor explains the price drop    |
//! | `TooLarge`          | div > 3.5% of price and ÷divisor explains the price drop    |
//! | `Phantom`           | duplicate of a nearby dividend whose price drop is larger   |
//!
//! Repairs only ever touch `adj_close` of earlier bars and the event's own
//! `dividends` field; OHLC is never changed here.

use super::{scale_adj_close_before, Corrector, CorrectorReport, SkipReason, UnitMixupCorrector};
use crate::stats::safe_ratio;
use crate::domain::{Bar, RepairOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_BARS: usize = 2;

/// Largest adjustment-factor step still read as "no adjustment applied".
const MISSING_ADJ_TOLERANCE: f64 = 0.001;
/// Dividend yields below this are candidates for a ×divisor error.
const TOO_SMALL_PCT: f64 = 0.001;
/// Dividend yields above this are candidates for a ÷divisor error.
const TOO_LARGE_PCT: f64 = 0.035;
/// Two dividends this close in calendar days may be one event recorded twice.
const PHANTOM_WINDOW_DAYS: i64 = 17;
/// Duplicate amounts agree within this relative difference.
const PHANTOM_AMOUNT_TOLERANCE: f64 = 0.08;
/// A phantom's price drop is below this fraction of its twin's.
const PHANTOM_DROP_RATIO: f64 = 0.66;
/// Bars in the centered volatility window around an event.
const VOLATILITY_WINDOW: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendDefect {
    MissingAdjustment,
    TooSmall,
    TooLarge,
    Phantom,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendReport {
    pub dividend_events: usize,
    pub missing_adjustment: usize,
    pub too_small: usize,
    pub too_large: usize,
    pub phantom: usize,
    pub skipped_reason: Option<SkipReason>,
}

impl DividendReport {
    fn record(&mut self, defect: DividendDefect) {
        match defect {
            DividendDefect::MissingAdjustment => self.missing_adjustment += 1,
            DividendDefect::TooSmall => self.too_small += 1,
            DividendDefect::TooLarge => self.too_large += 1,
            DividendDefect::Phantom => self.phantom += 1,
        }
    }
}

/// Measurements around one dividend event. Prices come from the
/// unit-consistent reference series; adjustment factors come from the bars
/// being repaired.
#[derive(Debug, Clone, Copy)]
struct DividendEvent {
    index: usize,
    dividend: f64,
    prev_close: f64,
    div_pct: f64,
    price_drop: f64,
    volatility: f64,
    prev_factor: Option<f64>,
    event_factor: Option<f64>,
}

impl DividendEvent {
    fn at(bars: &[Bar], reference: &[Bar], index: usize) -> Option<Self> {
        if index == 0 || !bars[index].has_dividend() {
            return None;
        }
        let prev = prev_priced(reference, index)?;
        let prev_close = reference[prev].close;
        if prev_close <= 0.0 || !prev_close.is_finite() {
            return None;
        }
        let dividend = bars[index].dividends;
        Some(Self {
            index,
            dividend,
            prev_close,
            div_pct: dividend / prev_close,
            price_drop: price_drop(reference, index),
            volatility: typical_overnight_move(reference, index),
            prev_factor: bars[prev].adj_factor(),
            event_factor: event_factor(bars, index),
        })
    }

    /// Adjustment ratio currently applied across the event.
    fn applied_ratio(&self) -> Option<f64> {
        safe_ratio(self.prev_factor?, self.event_factor?)
    }
}

/// Nearest bar before `index` with no zero or NaN price.
fn prev_priced(bars: &[Bar], index: usize) -> Option<usize> {
    (0..index).rev().find(|&j| !bars[j].has_zero_price())
}

/// Adjustment factor in force on the event bar. A zero event bar takes the
/// factor of the next priced bar, unless another action sits in between.
fn event_factor(bars: &[Bar], index: usize) -> Option<f64> {
    if !bars[index].has_zero_price() {
        return bars[index].adj_factor();
    }
    let next = (index + 1..bars.len()).find(|&j| !bars[j].has_zero_price())?;
    if bars[index + 1..=next].iter().any(Bar::has_corporate_action) {
        return None;
    }
    bars[next].adj_factor()
}

/// `prev_close - low` of the event bar. NaN without an earlier priced bar.
fn price_drop(reference: &[Bar], index: usize) -> f64 {
    match prev_priced(reference, index) {
        Some(prev) => reference[prev].close - reference[index].low,
        None => f64::NAN,
    }
}

/// Mean `|close[j] - low[j+1]|` over a centered window around `index`,
/// leaving out the event's own pair and pairs touching a zero bar. Zero when
/// no pair is available.
fn typical_overnight_move(bars: &[Bar], index: usize) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let half = VOLATILITY_WINDOW / 2;
    let lo = index.saturating_sub(half);
    let hi = (index + half - 1).min(bars.len() - 2);
    let moves: Vec<f64> = (lo..=hi)
        .filter(|&j| j + 1 != index)
        .filter(|&j| !bars[j].has_zero_price() && !bars[j + 1].has_zero_price())
        .map(|j| (bars[j].close - bars[j + 1].low).abs())
        .filter(|v| v.is_finite())
        .collect();
    if moves.is_empty() {
        return 0.0;
    }
    moves.iter().sum::<f64>() / moves.len() as f64
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DividendCorrector;

impl DividendCorrector {
    pub fn new() -> Self {
        Self
    }

    fn skip_reason(bars: &[Bar], options: &RepairOptions) -> Option<SkipReason> {
        if bars.len() < MIN_BARS {
            return Some(SkipReason::InsufficientData);
        }
        if options.interval.is_weekly_or_monthly() {
            return Some(SkipReason::IntervalTooCoarse);
        }
        if bars.iter().any(Bar::has_capital_gains) {
            return Some(SkipReason::HasCapitalGains);
        }
        if !bars.iter().skip(1).any(Bar::has_dividend) {
            return Some(SkipReason::NoEvents);
        }
        None
    }

    /// Adjustment factor is flat across the event, and the observed ratio
    /// sits closer to 1 than to the ratio the dividend implies.
    fn adjustment_missing(event: &DividendEvent) -> bool {
        let (Some(prev), Some(curr)) = (event.prev_factor, event.event_factor) else {
            return false;
        };
        if (prev - curr).abs() >= MISSING_ADJ_TOLERANCE {
            return false;
        }
        let Some(present) = event.applied_ratio() else {
            return false;
        };
        let expected = 1.0 - event.div_pct;
        (present - 1.0).abs() < (present - expected).abs()
    }

    fn is_phantom(bars: &[Bar], reference: &[Bar], event: &DividendEvent) -> bool {
        let date = bars[event.index].date;
        (1..bars.len())
            .filter(|&k| k != event.index && bars[k].has_dividend())
            .filter(|&k| (bars[k].date - date).num_days().abs() <= PHANTOM_WINDOW_DAYS)
            .any(|k| {
                let twin_amount = bars[k].dividends;
                let similar = (event.dividend / twin_amount - 1.0).abs() <= PHANTOM_AMOUNT_TOLERANCE;
                let twin_drop = price_drop(reference, k);
                similar && twin_drop > 0.0 && event.price_drop < PHANTOM_DROP_RATIO * twin_drop
            })
    }

    fn classify(
        bars: &[Bar],
        reference: &[Bar],
        event: &DividendEvent,
        divisor: f64,
    ) -> Option<DividendDefect> {
        if Self::adjustment_missing(event) {
            return Some(DividendDefect::MissingAdjustment);
        }
        if event.div_pct < TOO_SMALL_PCT {
            let net_drop = event.price_drop - event.volatility;
            let scaled = event.dividend * divisor;
            if (scaled - net_drop).abs() <= (event.dividend - net_drop).abs() {
                return Some(DividendDefect::TooSmall);
            }
        }
        // Yields above 100% are covered by this bound too.
        if event.div_pct > TOO_LARGE_PCT {
            let scaled = event.dividend / divisor;
            if (scaled - event.price_drop).abs() <= (event.dividend - event.price_drop).abs() {
                return Some(DividendDefect::TooLarge);
            }
        }
        if Self::is_phantom(bars, reference, event) {
            return Some(DividendDefect::Phantom);
        }
        None
    }

    /// Replace the event's dividend and re-derive the adjustment of every
    /// earlier bar from it.
    fn rescale_dividend(bars: &mut [Bar], event: &DividendEvent, new_dividend: f64) -> bool {
        let correct = 1.0 - new_dividend / event.prev_close;
        if correct <= 0.0 {
            return false;
        }
        let present = match event.applied_ratio() {
            Some(p) if p > 0.0 => p,
            Some(_) => return false,
            None => 1.0,
        };
        scale_adj_close_before(bars, event.index, correct / present);
        let bar = &mut bars[event.index];
        bar.dividends = new_dividend;
        bar.repaired = true;
        true
    }

    fn repair(bars: &mut [Bar], event: &DividendEvent, defect: DividendDefect, divisor: f64) -> bool {
        match defect {
            DividendDefect::MissingAdjustment => {
                let factor = 1.0 - event.div_pct;
                if factor <= 0.0 {
                    return false;
                }
                scale_adj_close_before(bars, event.index, factor);
                true
            }
            DividendDefect::TooSmall => {
                Self::rescale_dividend(bars, event, event.dividend * divisor)
            }
            DividendDefect::TooLarge => {
                Self::rescale_dividend(bars, event, event.dividend / divisor)
            }
            DividendDefect::Phantom => {
                if let Some(present) = event.applied_ratio() {
                    if present > 0.0 && present < 1.0 {
                        scale_adj_close_before(bars, event.index, 1.0 / present);
                    }
                }
                let bar = &mut bars[event.index];
                bar.dividends = 0.0;
                bar.repaired = true;
                true
            }
        }
    }

    /// Classify and repair every event oldest first; returns the counts.
    fn repair_in_place(bars: &mut [Bar], options: &RepairOptions) -> DividendReport {
        let mut report = DividendReport::default();
        if let Some(reason) = Self::skip_reason(bars, options) {
            report.skipped_reason = Some(reason);
            return report;
        }
        let divisor = options.currency.subunit_divisor();
        // Yields and price drops are read against the prices the unit stage
        // will leave, so a ×100 bar next to the event cannot skew them.
        let reference = if options.toggles.unit_mixups {
            UnitMixupCorrector::unit_consistent(bars, options)
        } else {
            bars.to_vec()
        };

        for index in 1..bars.len() {
            let Some(event) = DividendEvent::at(bars, &reference, index) else {
                continue;
            };
            report.dividend_events += 1;
            let Some(defect) = Self::classify(bars, &reference, &event, divisor) else {
                continue;
            };
            if Self::repair(bars, &event, defect, divisor) {
                debug!(
                    ticker = options.label(),
                    date = %bars[index].date,
                    dividend = event.dividend,
                    ?defect,
                    "dividend repaired"
                );
                report.record(defect);
            }
        }
        report
    }
}

impl Corrector for DividendCorrector {
    fn name(&self) -> &str {
        "dividends"
    }

    fn enabled(&self, options: &RepairOptions) -> bool {
        options.toggles.dividends
    }

    fn apply(&self, mut bars: Vec<Bar>, options: &RepairOptions) -> Vec<Bar> {
        let report = Self::repair_in_place(&mut bars, options);
        if let Some(reason) = report.skipped_reason {
            debug!(ticker = options.label(), ?reason, "dividend repair skipped");
        }
        bars
    }

    fn analyze(&self, bars: &[Bar], options: &RepairOptions) -> CorrectorReport {
        let mut scratch = bars.to_vec();
        CorrectorReport::Dividends(Self::repair_in_place(&mut scratch, options))
    }
}
