//! RepairLab Core: repairs defects in daily and intraday price series.
//!
//! This crate contains:
//! - Domain types (bars, intervals, quote types, currencies, repair options)
//! - A small statistics kit (IQR filtering, percentiles, medians, rolling windows)
//! - Five correctors: dividends, unit mixups, splits, zero values, capital gains
//! - The `Repairer` pipeline that runs them in a fixed order
//! - TOML configuration and CSV bar I/O

pub mod config;
pub mod data;
pub mod domain;
pub mod fingerprint;
pub mod repair;
pub mod stats;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::RepairOptions>();
        require_sync::<domain::RepairOptions>();

        require_send::<repair::Repairer>();
        require_sync::<repair::Repairer>();
        require_send::<repair::RepairSummary>();
        require_sync::<repair::RepairSummary>();
        require_send::<repair::RepairAnalysis>();
        require_sync::<repair::RepairAnalysis>();

        require_send::<config::RepairConfig>();
        require_sync::<config::RepairConfig>();
        require_send::<fingerprint::SeriesHash>();
        require_sync::<fingerprint::SeriesHash>();
    }

    /// Correctors take owned bars and return owned bars; they never see the
    /// caller's buffer.
    #[test]
    fn corrector_trait_takes_owned_bars() {
        fn _check_trait_object_builds(
            stage: &dyn repair::Corrector,
            bars: Vec<domain::Bar>,
            options: &domain::RepairOptions,
        ) -> Vec<domain::Bar> {
            stage.apply(bars, options)
        }
    }
}
