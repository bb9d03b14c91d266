//! Repair options: instrument context plus per-corrector toggles.
//!
//! Options are plain immutable values threaded through every corrector.
//! There is no process-wide default; callers build one explicitly (or take
//! `RepairOptions::default()` as a value).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("unknown interval '{0}' (expected one of 1m 2m 5m 15m 30m 60m 90m 1h 1d 5d 1wk 1mo 3mo)")]
    UnknownInterval(String),

    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),
}

/// Bar spacing, using Yahoo's interval vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Minute1,
    Minute2,
    Minute5,
    Minute15,
    Minute30,
    Minute60,
    Minute90,
    Hour1,
    Day1,
    Day5,
    Week1,
    Month1,
    Month3,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute2 => "2m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Minute60 => "60m",
            Interval::Minute90 => "90m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Day5 => "5d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
            Interval::Month3 => "3mo",
        }
    }

    /// Dividend repair needs daily (or finer) spacing to see the ex-date drop.
    pub fn is_weekly_or_monthly(&self) -> bool {
        matches!(self, Interval::Week1 | Interval::Month1 | Interval::Month3)
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Interval::Minute1
                | Interval::Minute2
                | Interval::Minute5
                | Interval::Minute15
                | Interval::Minute30
                | Interval::Minute60
                | Interval::Minute90
                | Interval::Hour1
        )
    }
}

impl FromStr for Interval {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let interval = match s.trim() {
            "1m" => Interval::Minute1,
            "2m" => Interval::Minute2,
            "5m" => Interval::Minute5,
            "15m" => Interval::Minute15,
            "30m" => Interval::Minute30,
            "60m" => Interval::Minute60,
            "90m" => Interval::Minute90,
            "1h" => Interval::Hour1,
            "1d" => Interval::Day1,
            "5d" => Interval::Day5,
            "1wk" => Interval::Week1,
            "1mo" => Interval::Month1,
            "3mo" => Interval::Month3,
            other => return Err(OptionsError::UnknownInterval(other.to_string())),
        };
        Ok(interval)
    }
}

impl TryFrom<String> for Interval {
    type Error = OptionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.as_str().to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Yahoo quote type of the instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuoteType {
    Equity,
    Etf,
    MutualFund,
    Index,
    Currency,
    Cryptocurrency,
    Future,
    Option,
    Other(String),
}

impl QuoteType {
    /// Capital-gains distributions only exist for fund instruments.
    pub fn is_fund(&self) -> bool {
        matches!(self, QuoteType::Etf | QuoteType::MutualFund)
    }

    pub fn as_str(&self) -> &str {
        match self {
            QuoteType::Equity => "EQUITY",
            QuoteType::Etf => "ETF",
            QuoteType::MutualFund => "MUTUALFUND",
            QuoteType::Index => "INDEX",
            QuoteType::Currency => "CURRENCY",
            QuoteType::Cryptocurrency => "CRYPTOCURRENCY",
            QuoteType::Future => "FUTURE",
            QuoteType::Option => "OPTION",
            QuoteType::Other(s) => s,
        }
    }
}

impl From<&str> for QuoteType {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQUITY" => QuoteType::Equity,
            "ETF" => QuoteType::Etf,
            "MUTUALFUND" => QuoteType::MutualFund,
            "INDEX" => QuoteType::Index,
            "CURRENCY" => QuoteType::Currency,
            "CRYPTOCURRENCY" => QuoteType::Cryptocurrency,
            "FUTURE" => QuoteType::Future,
            "OPTION" => QuoteType::Option,
            other => QuoteType::Other(other.to_string()),
        }
    }
}

impl From<String> for QuoteType {
    fn from(s: String) -> Self {
        QuoteType::from(s.as_str())
    }
}

impl From<QuoteType> for String {
    fn from(q: QuoteType) -> Self {
        q.as_str().to_string()
    }
}

impl fmt::Display for QuoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currencies whose minor unit has three decimals (1 major = 1000 minor).
const THREE_DECIMAL_CURRENCIES: [&str; 7] = ["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// ISO-4217 exchange currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, OptionsError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OptionsError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Factor between the major unit and the sub-unit prices get confused with.
    pub fn subunit_divisor(&self) -> f64 {
        if THREE_DECIMAL_CURRENCIES.contains(&self.0.as_str()) {
            1000.0
        } else {
            100.0
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl TryFrom<String> for Currency {
    type Error = OptionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One enable flag per corrector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectorToggles {
    pub dividends: bool,
    pub unit_mixups: bool,
    pub splits: bool,
    pub zeroes: bool,
    pub capital_gains: bool,
}

impl Default for CorrectorToggles {
    fn default() -> Self {
        Self {
            dividends: true,
            unit_mixups: true,
            splits: true,
            zeroes: true,
            capital_gains: true,
        }
    }
}

impl CorrectorToggles {
    pub fn none() -> Self {
        Self {
            dividends: false,
            unit_mixups: false,
            splits: false,
            zeroes: false,
            capital_gains: false,
        }
    }
}

/// Immutable configuration passed to every corrector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOptions {
    /// Used in diagnostics only.
    pub ticker: Option<String>,
    pub interval: Interval,
    pub currency: Currency,
    pub quote_type: QuoteType,
    pub toggles: CorrectorToggles,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            ticker: None,
            interval: Interval::Day1,
            currency: Currency::default(),
            quote_type: QuoteType::Equity,
            toggles: CorrectorToggles::default(),
        }
    }
}

impl RepairOptions {
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_quote_type(mut self, quote_type: QuoteType) -> Self {
        self.quote_type = quote_type;
        self
    }

    pub fn with_toggles(mut self, toggles: CorrectorToggles) -> Self {
        self.toggles = toggles;
        self
    }

    /// Ticker label for log lines.
    pub fn label(&self) -> &str {
        self.ticker.as_deref().unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_yahoo_strings() {
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::Day1);
        assert_eq!("1wk".parse::<Interval>().unwrap(), Interval::Week1);
        assert_eq!(Interval::Month3.to_string(), "3mo");
        assert!(matches!(
            "2d".parse::<Interval>(),
            Err(OptionsError::UnknownInterval(_))
        ));
    }

    #[test]
    fn weekly_and_monthly_intervals() {
        assert!(Interval::Week1.is_weekly_or_monthly());
        assert!(Interval::Month1.is_weekly_or_monthly());
        assert!(Interval::Month3.is_weekly_or_monthly());
        assert!(!Interval::Day1.is_weekly_or_monthly());
        assert!(!Interval::Day5.is_weekly_or_monthly());
        assert!(Interval::Hour1.is_intraday());
    }

    #[test]
    fn quote_type_fund_detection() {
        assert!(QuoteType::from("etf").is_fund());
        assert!(QuoteType::from("MUTUALFUND").is_fund());
        assert!(!QuoteType::from("EQUITY").is_fund());
        assert_eq!(QuoteType::from("WARRANT"), QuoteType::Other("WARRANT".into()));
    }

    #[test]
    fn currency_divisor() {
        assert_eq!(Currency::new("usd").unwrap().subunit_divisor(), 100.0);
        assert_eq!(Currency::new("KWD").unwrap().subunit_divisor(), 1000.0);
        assert!(Currency::new("US").is_err());
    }

    #[test]
    fn options_serde_uses_plain_strings() {
        let opts = RepairOptions::default()
            .with_ticker("VTSAX")
            .with_quote_type(QuoteType::MutualFund);
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["interval"], "1d");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["quote_type"], "MUTUALFUND");
        let back: RepairOptions = serde_json::from_value(json).unwrap();
        assert_eq!(back, opts);
    }
}
