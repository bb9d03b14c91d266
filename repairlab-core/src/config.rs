//! TOML repair configuration.
//!
//! ```toml
//! [instrument]
//! ticker = "VWELX"
//! interval = "1d"
//! currency = "USD"
//! quote_type = "MUTUALFUND"
//!
//! [correctors]
//! dividends = true
//! unit_mixups = true
//! splits = true
//! zeroes = false
//! capital_gains = true
//! ```
//!
//! Every key is optional; missing keys take the `RepairOptions` defaults.

use crate::domain::{CorrectorToggles, Currency, Interval, QuoteType, RepairOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub ticker: Option<String>,
    pub interval: Interval,
    pub currency: Currency,
    pub quote_type: QuoteType,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        let defaults = RepairOptions::default();
        Self {
            ticker: defaults.ticker,
            interval: defaults.interval,
            currency: defaults.currency,
            quote_type: defaults.quote_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub instrument: InstrumentConfig,
    pub correctors: CorrectorToggles,
}

impl RepairConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn into_options(self) -> RepairOptions {
        RepairOptions {
            ticker: self.instrument.ticker,
            interval: self.instrument.interval,
            currency: self.instrument.currency,
            quote_type: self.instrument.quote_type,
            toggles: self.correctors,
        }
    }
}

impl From<RepairOptions> for RepairConfig {
    fn from(options: RepairOptions) -> Self {
        Self {
            instrument: InstrumentConfig {
                ticker: options.ticker,
                interval: options.interval,
                currency: options.currency,
                quote_type: options.quote_type,
            },
            correctors: options.toggles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default_options() {
        let config = RepairConfig::from_toml_str("").unwrap();
        assert_eq!(config.into_options(), RepairOptions::default());
    }

    #[test]
    fn full_config_parses() {
        let config = RepairConfig::from_toml_str(
            r#"
            [instrument]
            ticker = "VWELX"
            interval = "1wk"
            currency = "kwd"
            quote_type = "MUTUALFUND"

            [correctors]
            zeroes = false
            "#,
        )
        .unwrap();
        let options = config.into_options();
        assert_eq!(options.ticker.as_deref(), Some("VWELX"));
        assert_eq!(options.interval, Interval::Week1);
        assert_eq!(options.currency.subunit_divisor(), 1000.0);
        assert!(options.quote_type.is_fund());
        assert!(!options.toggles.zeroes);
        assert!(options.toggles.dividends);
    }

    #[test]
    fn unknown_interval_is_rejected() {
        let err = RepairConfig::from_toml_str("[instrument]\ninterval = \"7d\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("7d"));
    }

    #[test]
    fn options_survive_toml() {
        let options = RepairOptions::default().with_ticker("AAPL");
        let text = RepairConfig::from(options.clone()).to_toml_string().unwrap();
        let back = RepairConfig::from_toml_str(&text).unwrap().into_options();
        assert_eq!(back, options);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RepairConfig::load(Path::new("/nonexistent/repair.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/repair.toml"));
    }
}
