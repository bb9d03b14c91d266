//! Domain types for the repair engine

pub mod bar;
pub mod options;

pub use bar::Bar;
pub use options::{CorrectorToggles, Currency, Interval, OptionsError, QuoteType, RepairOptions};
