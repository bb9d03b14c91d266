//! Double-counted capital-gains distributions in fund adjusted closes.
//!
//! Some feeds fold a fund's capital gain into the dividend field and then
//! subtract it again through the capital-gains field, so `adj_close` drops
//! twice. The repair is all-or-nothing per series: it only runs when most
//! events look double-counted.

use super::{applied_ratio, scale_adj_close_before, Corrector, CorrectorReport, SkipReason};
use crate::domain::{Bar, RepairOptions};
use crate::stats::mean;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const MIN_BARS: usize = 2;

/// Share of capital-gains events that must look double-counted: 2/3.
const MAJORITY_NUM: usize = 2;
const MAJORITY_DEN: usize = 3;

/// Corrections closer to 1 than this are already in place.
const CORRECTION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalGainsReport {
    pub events: usize,
    pub double_counted: usize,
    /// `double_counted / events`, 0 when there are no events.
    pub ratio: f64,
    pub will_fix: bool,
    pub skipped_reason: Option<SkipReason>,
}

#[derive(Debug, Clone, Copy)]
struct GainsEvent {
    index: usize,
    double_counted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CapitalGainsCorrector;

impl CapitalGainsCorrector {
    pub fn new() -> Self {
        Self
    }

    fn skip_reason(bars: &[Bar], options: &RepairOptions) -> Option<SkipReason> {
        if bars.len() < MIN_BARS {
            return Some(SkipReason::InsufficientData);
        }
        if !options.quote_type.is_fund() {
            return Some(SkipReason::NotAFund);
        }
        if !bars.iter().any(Bar::has_capital_gains) {
            return Some(SkipReason::NoEvents);
        }
        None
    }

    /// Mean |daily % change of close| over bars with no distribution.
    fn normal_volatility(bars: &[Bar]) -> f64 {
        let moves: Vec<f64> = (1..bars.len())
            .filter(|&i| !bars[i].has_dividend() && !bars[i].has_capital_gains())
            .filter_map(|i| {
                let prev = bars[i - 1].close;
                if prev == 0.0 || !prev.is_finite() {
                    return None;
                }
                Some(((bars[i].close - prev) / prev).abs())
            })
            .collect();
        let m = mean(&moves);
        if m.is_nan() {
            0.0
        } else {
            m
        }
    }

    fn classify(bars: &[Bar]) -> Vec<GainsEvent> {
        let normal = Self::normal_volatility(bars);
        (1..bars.len())
            .filter(|&i| bars[i].has_capital_gains())
            .filter_map(|i| {
                let prev_close = bars[i - 1].close;
                if prev_close <= 0.0 || !prev_close.is_finite() {
                    return None;
                }
                let bar = &bars[i];
                let actual_drop = (prev_close - bar.close) / prev_close - normal;
                let folded = (bar.dividends - bar.capital_gains) / prev_close;
                let separate = (bar.dividends + bar.capital_gains) / prev_close;
                Some(GainsEvent {
                    index: i,
                    double_counted: (actual_drop - folded).abs() < (actual_drop - separate).abs(),
                })
            })
            .collect()
    }

    fn majority_double_counted(events: &[GainsEvent]) -> bool {
        let double = events.iter().filter(|e| e.double_counted).count();
        !events.is_empty() && double * MAJORITY_DEN >= events.len() * MAJORITY_NUM
    }

    /// Re-derive the adjustment at one event from `true dividend + gains`
    /// applied once. Returns false when nothing changed.
    fn fix_event(bars: &mut [Bar], index: usize) -> bool {
        let prev_close = bars[index - 1].close;
        let true_dividend = bars[index].dividends - bars[index].capital_gains;
        let correct = 1.0 - (true_dividend + bars[index].capital_gains) / prev_close;
        let Some(present) = applied_ratio(bars, index) else {
            return false;
        };
        if correct <= 0.0 || present <= 0.0 {
            return false;
        }
        let correction = correct / present;
        if (correction - 1.0).abs() < CORRECTION_EPSILON {
            return false;
        }
        scale_adj_close_before(bars, index, correction);
        bars[index].repaired = true;
        true
    }
}

impl Corrector for CapitalGainsCorrector {
    fn name(&self) -> &str {
        "capital_gains"
    }

    fn enabled(&self, options: &RepairOptions) -> bool {
        options.toggles.capital_gains
    }

    fn apply(&self, mut bars: Vec<Bar>, options: &RepairOptions) -> Vec<Bar> {
        if let Some(reason) = Self::skip_reason(&bars, options) {
            debug!(ticker = options.label(), ?reason, "capital-gains repair skipped");
            return bars;
        }
        let events = Self::classify(&bars);
        if !Self::majority_double_counted(&events) {
            debug!(
                ticker = options.label(),
                events = events.len(),
                "capital gains not double-counted"
            );
            return bars;
        }

        let mut fixed = 0;
        for event in events.iter().rev() {
            if Self::fix_event(&mut bars, event.index) {
                fixed += 1;
            }
        }
        if fixed > 0 {
            info!(ticker = options.label(), fixed, "double-counted capital gains repaired");
        }
        bars
    }

    fn analyze(&self, bars: &[Bar], options: &RepairOptions) -> CorrectorReport {
        let mut report = CapitalGainsReport::default();
        if let Some(reason) = Self::skip_reason(bars, options) {
            report.skipped_reason = Some(reason);
            return CorrectorReport::CapitalGains(report);
        }
        let events = Self::classify(bars);
        report.events = events.len();
        report.double_counted = events.iter().filter(|e| e.double_counted).count();
        if report.events > 0 {
            report.ratio = report.double_counted as f64 / report.events as f64;
        }
        report.will_fix = Self::majority_double_counted(&events);
        CorrectorReport::CapitalGains(report)
    }
}
