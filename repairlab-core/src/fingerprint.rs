//! Series fingerprinting: a deterministic identity for a bar sequence.
//!
//! Used by the repair summary to tell whether a pass changed anything, and by
//! the CLI `check` command to verify that a second repair pass is a no-op.

use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 digest (hex) of the canonical JSON form of a bar series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesHash(pub String);

impl SeriesHash {
    pub fn of(bars: &[Bar]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in bars {
            // Struct field order is fixed, so the encoding is canonical.
            // NaN prices encode as null, which is stable too.
            let json = serde_json::to_vec(bar).unwrap_or_default();
            hasher.update(&json);
            hasher.update(b"\n");
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for SeriesHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
