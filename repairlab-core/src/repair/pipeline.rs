//! The repair pipeline.
//!
//! `Repairer` copies the caller's bars once, threads the owned buffer through
//! each enabled stage in a fixed order, then restores OHLC bounds on every
//! repaired bar. The caller's slice is never touched, and a `Repairer` holds
//! no per-call state, so one instance can serve many threads.

use super::{
    CapitalGainsCorrector, Corrector, CorrectorReport, DividendCorrector, SplitCorrector,
    UnitMixupCorrector, ZeroValueRepairer,
};
use crate::domain::{Bar, RepairOptions};
use crate::fingerprint::SeriesHash;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-stage outcome of one `repair_with_summary` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub enabled: bool,
    /// Bars this stage flagged that were not flagged before it ran.
    pub newly_flagged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub ticker: Option<String>,
    pub bar_count: usize,
    pub stages: Vec<StageSummary>,
    pub repaired_bars: usize,
    pub input_hash: SeriesHash,
    pub output_hash: SeriesHash,
}

impl RepairSummary {
    pub fn changed(&self) -> bool {
        self.input_hash != self.output_hash
    }
}

/// Read-only diagnostics from every enabled stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAnalysis {
    pub ticker: Option<String>,
    pub bar_count: usize,
    pub reports: Vec<CorrectorReport>,
}

impl RepairAnalysis {
    pub fn total_defects(&self) -> usize {
        self.reports.iter().map(CorrectorReport::defect_count).sum()
    }
}

pub struct Repairer {
    options: RepairOptions,
    stages: Vec<Box<dyn Corrector>>,
}

impl Repairer {
    /// Standard pipeline: dividends → unit mixups → splits → zeroes → capital gains.
    ///
    /// Dividends go first so a genuine ex-date drop is never mistaken for a
    /// unit or split error; capital gains go last because they assume clean
    /// adjustment factors.
    pub fn new(options: RepairOptions) -> Self {
        Self::with_stages(
            options,
            vec![
                Box::new(DividendCorrector::new()),
                Box::new(UnitMixupCorrector::new()),
                Box::new(SplitCorrector::new()),
                Box::new(ZeroValueRepairer::new()),
                Box::new(CapitalGainsCorrector::new()),
            ],
        )
    }

    /// Pipeline with a caller-chosen stage list, run in the given order.
    pub fn with_stages(options: RepairOptions, stages: Vec<Box<dyn Corrector>>) -> Self {
        Self { options, stages }
    }

    pub fn options(&self) -> &RepairOptions {
        &self.options
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn repair(&self, bars: &[Bar]) -> Vec<Bar> {
        self.repair_with_summary(bars).0
    }

    pub fn repair_with_summary(&self, bars: &[Bar]) -> (Vec<Bar>, RepairSummary) {
        let input_hash = SeriesHash::of(bars);
        let mut buffer = bars.to_vec();
        let mut stages = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let enabled = stage.enabled(&self.options);
            if !enabled {
                debug!(ticker = self.options.label(), stage = stage.name(), "stage disabled");
                stages.push(StageSummary {
                    stage: stage.name().to_string(),
                    enabled,
                    newly_flagged: 0,
                });
                continue;
            }
            let flagged_before = count_repaired(&buffer);
            buffer = stage.apply(buffer, &self.options);
            let newly_flagged = count_repaired(&buffer).saturating_sub(flagged_before);
            if newly_flagged > 0 {
                info!(
                    ticker = self.options.label(),
                    stage = stage.name(),
                    newly_flagged,
                    "stage repaired bars"
                );
            }
            stages.push(StageSummary {
                stage: stage.name().to_string(),
                enabled,
                newly_flagged,
            });
        }

        enforce_ohlc_bounds(&mut buffer);

        let summary = RepairSummary {
            ticker: self.options.ticker.clone(),
            bar_count: buffer.len(),
            stages,
            repaired_bars: count_repaired(&buffer),
            output_hash: SeriesHash::of(&buffer),
            input_hash,
        };
        (buffer, summary)
    }

    /// Diagnostics of every enabled stage against the unmodified input.
    pub fn analyze(&self, bars: &[Bar]) -> RepairAnalysis {
        let reports = self
            .stages
            .iter()
            .filter(|s| s.enabled(&self.options))
            .map(|s| s.analyze(bars, &self.options))
            .collect();
        RepairAnalysis {
            ticker: self.options.ticker.clone(),
            bar_count: bars.len(),
            reports,
        }
    }
}

fn count_repaired(bars: &[Bar]) -> usize {
    bars.iter().filter(|b| b.repaired).count()
}

/// On repaired bars with all-positive OHLC, widen high/low to cover open and close.
pub fn enforce_ohlc_bounds(bars: &mut [Bar]) {
    for bar in bars.iter_mut().filter(|b| b.repaired) {
        let ohlc = bar.ohlc();
        if !ohlc.iter().all(|v| v.is_finite() && *v > 0.0) {
            continue;
        }
        bar.high = ohlc.iter().copied().fold(f64::MIN, f64::max);
        bar.low = ohlc.iter().copied().fold(f64::MAX, f64::min);
    }
}
