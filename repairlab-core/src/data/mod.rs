//! Bar file I/O and structured data errors.
//!
//! Fetching is the upstream layer's job; this module only moves already
//! retrieved bars in and out of CSV files.

pub mod csv_io;

pub use csv_io::{read_bars, read_bars_csv, write_bars, write_bars_csv};

use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output as-is.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: invalid date '{value}' (expected YYYY-MM-DD[ HH:MM:SS])")]
    InvalidDate { row: usize, value: String },

    #[error("validation error: {0}")]
    Validation(String),
}
