//! Currency-unit mixups: prices quoted in the sub-unit (pence, cents, fils)
//! instead of the major unit, or the other way round.
//!
//! Three detectors run in order:
//! 1. **Partial mixups**: single price fields ×100 away from the rest of
//!    their bar. Only those fields are rescaled.
//! 2. **Unit switch**: the feed changed unit at some date. Every bar before
//!    the boundary is rescaled by the divisor (volume inversely).
//! 3. **Random mixups**: isolated bars ×100 off, found with a 3×3 median
//!    filter over (bar × field). Only the five price fields are rescaled.

use super::{Corrector, CorrectorReport, SkipReason};
use crate::domain::{Bar, RepairOptions};
use crate::stats::{iqr_inliers, mean, median, median_filter_2d, std_dev};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum series length for either detector.
pub const MIN_BARS: usize = 3;

/// A divisor inside this band is no unit change at all.
const NO_CHANGE_BAND: (f64, f64) = (0.8, 1.25);

/// Daily moves beyond `1 + NOISE_SIGMAS · sdPct` are not ordinary volatility.
const NOISE_SIGMAS: f64 = 5.0;

const RANDOM_MIXUP_WINDOW: usize = 3;
const RANDOM_MIXUP_FACTOR: f64 = 100.0;
/// Ratios are rounded to the nearest multiple of this before comparing to 100.
const RANDOM_MIXUP_ROUNDING: f64 = 20.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitMixupReport {
    pub divisor: f64,
    /// Bars with only some price fields ×100 off.
    pub partial_mixups: usize,
    pub switch_points: usize,
    pub random_mixups: usize,
    pub skipped_reason: Option<SkipReason>,
}

/// Boundary where the quoted unit changes. `exponent` is applied to every
/// bar before `index`: +1 multiplies by the divisor, -1 divides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UnitSwitch {
    index: usize,
    exponent: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MixupDirection {
    TooHigh,
    TooLow,
}

/// Per-field flags over `[high, open, low, close, adj_close]`.
type CellFlags = [Option<MixupDirection>; 5];

#[derive(Debug, Clone, Copy, Default)]
pub struct UnitMixupCorrector;

impl UnitMixupCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Bars with no zero or NaN price; the only ones either detector reads.
    fn usable(bars: &[Bar]) -> Vec<bool> {
        bars.iter()
            .map(|b| !b.has_zero_price() && b.mid_price().is_some())
            .collect()
    }

    /// Ratio of each usable bar's mid price to the previous usable bar's.
    /// Unusable bars and the first usable bar are NaN, so a zero bar never
    /// splits a spike from its revert.
    fn day_ratios(bars: &[Bar], usable: &[bool]) -> Vec<f64> {
        let mut ratios = vec![f64::NAN; bars.len()];
        let mut prev: Option<f64> = None;
        for (i, bar) in bars.iter().enumerate() {
            if !usable[i] {
                continue;
            }
            let Some(mid) = bar.mid_price() else {
                continue;
            };
            if let Some(p) = prev {
                ratios[i] = mid / p;
            }
            prev = Some(mid);
        }
        ratios
    }

    fn detect_switches(bars: &[Bar], divisor: f64) -> Result<Vec<UnitSwitch>, SkipReason> {
        if bars.len() < MIN_BARS {
            return Err(SkipReason::InsufficientData);
        }
        if divisor > NO_CHANGE_BAND.0 && divisor < NO_CHANGE_BAND.1 {
            return Err(SkipReason::DivisorIndistinguishable);
        }

        let usable = Self::usable(bars);
        let ratios = Self::day_ratios(bars, &usable);
        let inliers = iqr_inliers(&ratios);
        if inliers.is_empty() {
            return Err(SkipReason::InsufficientData);
        }
        let avg = mean(&inliers);
        if avg <= 0.0 {
            return Err(SkipReason::InsufficientData);
        }
        let sd_pct = std_dev(&inliers) / avg;

        let largest = divisor.max(1.0 / divisor);
        let noise = 1.0 + NOISE_SIGMAS * sd_pct;
        if largest <= noise {
            return Err(SkipReason::DivisorIndistinguishable);
        }
        let threshold = (largest + noise) / 2.0;

        let mut raw = Vec::new();
        for (index, &ratio) in ratios.iter().enumerate().skip(1) {
            if ratio.is_nan() {
                continue;
            }
            if ratio > threshold {
                raw.push(UnitSwitch { index, exponent: 1 });
            } else if ratio < 1.0 / threshold {
                raw.push(UnitSwitch { index, exponent: -1 });
            }
        }

        // A one-bar excursion (switch then revert on the next usable bar) is a
        // random mixup, not a permanent switch; the random detector owns it.
        let next_usable = |i: usize| (i + 1..bars.len()).find(|&j| usable[j]);
        let mut switches = Vec::with_capacity(raw.len());
        let mut k = 0;
        while k < raw.len() {
            if let Some(next) = raw.get(k + 1) {
                if Some(next.index) == next_usable(raw[k].index)
                    && next.exponent == -raw[k].exponent
                {
                    k += 2;
                    continue;
                }
            }
            switches.push(raw[k]);
            k += 1;
        }
        Ok(switches)
    }

    fn fix_switches(bars: &mut [Bar], divisor: f64, switches: &[UnitSwitch]) {
        // Net exponent per bar, so a later reverting switch cancels an earlier one.
        let mut exponents = vec![0i32; bars.len()];
        for switch in switches {
            for e in &mut exponents[..switch.index] {
                *e += switch.exponent;
            }
        }
        for (bar, &exponent) in bars.iter_mut().zip(&exponents) {
            if exponent == 0 {
                continue;
            }
            let factor = divisor.powi(exponent.abs());
            if exponent > 0 {
                bar.scale_prices(factor);
            } else {
                bar.scale_prices(1.0 / factor);
            }
            bar.repaired = true;
        }
    }

    fn price_vector(bar: &Bar) -> [f64; 5] {
        [bar.high, bar.open, bar.low, bar.close, bar.adj_close]
    }

    fn set_price_vector(bar: &mut Bar, values: [f64; 5]) {
        [bar.high, bar.open, bar.low, bar.close, bar.adj_close] = values;
    }

    fn round_to_step(value: f64) -> f64 {
        (value / RANDOM_MIXUP_ROUNDING).round() * RANDOM_MIXUP_ROUNDING
    }

    /// Direction of a cell that sits ×100 away from its reference value.
    fn cell_direction(value: f64, reference: f64) -> Option<MixupDirection> {
        if reference == 0.0 || reference.is_nan() {
            return None;
        }
        let ratio = value / reference;
        if Self::round_to_step(ratio) == RANDOM_MIXUP_FACTOR {
            Some(MixupDirection::TooHigh)
        } else if Self::round_to_step(1.0 / ratio) == RANDOM_MIXUP_FACTOR {
            Some(MixupDirection::TooLow)
        } else {
            None
        }
    }

    /// Cells ×100 away from the median of their own bar. Fixing them first
    /// leaves every bar internally consistent, so a bar with only some
    /// fields mixed up cannot pass for a unit-switch boundary.
    fn detect_partial_mixups(bars: &[Bar], usable: &[bool]) -> Vec<(usize, CellFlags)> {
        let mut partial = Vec::new();
        for (i, bar) in bars.iter().enumerate() {
            if !usable[i] {
                continue;
            }
            let values = Self::price_vector(bar);
            let reference = median(&values);
            let cells = values.map(|v| Self::cell_direction(v, reference));
            if cells.iter().any(Option::is_some) {
                partial.push((i, cells));
            }
        }
        partial
    }

    fn fix_partial_mixups(bars: &mut [Bar], partial: &[(usize, CellFlags)]) {
        for (i, cells) in partial {
            let bar = &mut bars[*i];
            let mut values = Self::price_vector(bar);
            for (value, cell) in values.iter_mut().zip(cells) {
                if let Some(direction) = cell {
                    *value = direction.correct(*value);
                }
            }
            Self::set_price_vector(bar, values);
            bar.repaired = true;
        }
    }

    /// Rows of the 3×3 filter whose cells sit ×100 away from the filtered
    /// value. One such cell marks the whole bar.
    fn detect_random_mixups(bars: &[Bar], usable: &[bool]) -> Vec<(usize, MixupDirection)> {
        let rows: Vec<usize> = (0..bars.len())
            .filter(|&i| usable[i] && !bars[i].adj_close.is_nan() && bars[i].adj_close != 0.0)
            .collect();
        if rows.len() < MIN_BARS {
            return Vec::new();
        }

        let matrix: Vec<Vec<f64>> = rows
            .iter()
            .map(|&i| Self::price_vector(&bars[i]).to_vec())
            .collect();
        let filtered = median_filter_2d(&matrix, RANDOM_MIXUP_WINDOW);

        let mut mixups = Vec::new();
        for (row, &bar_index) in rows.iter().enumerate() {
            let mut too_high = 0;
            let mut too_low = 0;
            for (value, med) in matrix[row].iter().zip(&filtered[row]) {
                match Self::cell_direction(*value, *med) {
                    Some(MixupDirection::TooHigh) => too_high += 1,
                    Some(MixupDirection::TooLow) => too_low += 1,
                    None => {}
                }
            }
            if too_high > 0 && too_high >= too_low {
                mixups.push((bar_index, MixupDirection::TooHigh));
            } else if too_low > 0 {
                mixups.push((bar_index, MixupDirection::TooLow));
            }
        }
        mixups
    }

    fn fix_random_mixups(bars: &mut [Bar], mixups: &[(usize, MixupDirection)]) {
        for &(i, direction) in mixups {
            let bar = &mut bars[i];
            let values = Self::price_vector(bar).map(|v| direction.correct(v));
            Self::set_price_vector(bar, values);
            bar.repaired = true;
        }
    }

    /// Runs every detector in order over an owned buffer.
    fn correct(mut bars: Vec<Bar>, divisor: f64) -> (Vec<Bar>, Detections) {
        let mut detections = Detections::default();
        if bars.len() < MIN_BARS {
            detections.switches = Err(SkipReason::InsufficientData);
            return (bars, detections);
        }

        let usable = Self::usable(&bars);
        let partial = Self::detect_partial_mixups(&bars, &usable);
        Self::fix_partial_mixups(&mut bars, &partial);
        detections.partial = partial.into_iter().map(|(i, _)| i).collect();

        detections.switches = Self::detect_switches(&bars, divisor);
        if let Ok(switches) = &detections.switches {
            Self::fix_switches(&mut bars, divisor, switches);
        }

        detections.random = Self::detect_random_mixups(&bars, &usable);
        Self::fix_random_mixups(&mut bars, &detections.random);
        (bars, detections)
    }

    /// Bars as the unit stage would leave them, without logging. Stages that
    /// run earlier measure prices against these.
    pub(crate) fn unit_consistent(bars: &[Bar], options: &RepairOptions) -> Vec<Bar> {
        Self::correct(bars.to_vec(), options.currency.subunit_divisor()).0
    }
}

impl MixupDirection {
    fn correct(self, value: f64) -> f64 {
        match self {
            MixupDirection::TooHigh => value / RANDOM_MIXUP_FACTOR,
            MixupDirection::TooLow => value * RANDOM_MIXUP_FACTOR,
        }
    }
}

/// What one run of the detectors found.
#[derive(Debug)]
struct Detections {
    partial: Vec<usize>,
    switches: Result<Vec<UnitSwitch>, SkipReason>,
    random: Vec<(usize, MixupDirection)>,
}

impl Default for Detections {
    fn default() -> Self {
        Self {
            partial: Vec::new(),
            switches: Ok(Vec::new()),
            random: Vec::new(),
        }
    }
}

impl Corrector for UnitMixupCorrector {
    fn name(&self) -> &str {
        "unit_mixups"
    }

    fn enabled(&self, options: &RepairOptions) -> bool {
        options.toggles.unit_mixups
    }

    fn apply(&self, bars: Vec<Bar>, options: &RepairOptions) -> Vec<Bar> {
        if bars.len() < MIN_BARS {
            return bars;
        }
        let (bars, detections) = Self::correct(bars, options.currency.subunit_divisor());

        for &i in &detections.partial {
            debug!(ticker = options.label(), date = %bars[i].date, "partial unit mixup");
        }
        match &detections.switches {
            Ok(switches) => {
                for s in switches {
                    debug!(
                        ticker = options.label(),
                        date = %bars[s.index].date,
                        exponent = s.exponent,
                        "unit switch boundary"
                    );
                }
            }
            Err(reason) => debug!(ticker = options.label(), ?reason, "unit switch scan skipped"),
        }
        for &(i, direction) in &detections.random {
            debug!(ticker = options.label(), date = %bars[i].date, ?direction, "random unit mixup");
        }
        bars
    }

    fn analyze(&self, bars: &[Bar], options: &RepairOptions) -> CorrectorReport {
        let divisor = options.currency.subunit_divisor();
        let mut report = UnitMixupReport {
            divisor,
            ..Default::default()
        };
        if bars.len() < MIN_BARS {
            report.skipped_reason = Some(SkipReason::InsufficientData);
            return CorrectorReport::UnitMixups(report);
        }

        let (_, detections) = Self::correct(bars.to_vec(), divisor);
        report.partial_mixups = detections.partial.len();
        match detections.switches {
            Ok(switches) => report.switch_points = switches.len(),
            Err(reason) => report.skipped_reason = Some(reason),
        }
        report.random_mixups = detections.random.len();
        CorrectorReport::UnitMixups(report)
    }
}
