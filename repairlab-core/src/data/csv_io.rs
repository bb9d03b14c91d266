//! CSV bar files.
//!
//! Header (lowercase, Yahoo-style capitalised names are accepted too):
//! `date,open,high,low,close,adj_close,volume,dividends,splits,capital_gains,repaired`.
//! Only `date` and the OHLC columns are required. Empty price cells read as
//! NaN and are written back as empty cells.

use super::DataError;
use crate::domain::Bar;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct CsvBarRow {
    #[serde(alias = "Date", alias = "Datetime")]
    date: String,
    #[serde(alias = "Open")]
    open: Option<f64>,
    #[serde(alias = "High")]
    high: Option<f64>,
    #[serde(alias = "Low")]
    low: Option<f64>,
    #[serde(alias = "Close")]
    close: Option<f64>,
    #[serde(default, alias = "Adj Close")]
    adj_close: Option<f64>,
    #[serde(default, alias = "Volume")]
    volume: Option<f64>,
    #[serde(default, alias = "Dividends")]
    dividends: Option<f64>,
    #[serde(default, alias = "Stock Splits")]
    splits: Option<f64>,
    #[serde(default, alias = "Capital Gains")]
    capital_gains: Option<f64>,
    #[serde(default, alias = "Repaired?")]
    repaired: Option<bool>,
}

fn parse_date(raw: &str, row: usize) -> Result<NaiveDateTime, DataError> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| DataError::InvalidDate {
            row,
            value: raw.to_string(),
        })
}

fn format_date(date: &NaiveDateTime) -> String {
    if date.time() == NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn finite_or_none(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

impl CsvBarRow {
    fn into_bar(self, row: usize) -> Result<Bar, DataError> {
        let date = parse_date(&self.date, row)?;
        let volume = self.volume.unwrap_or(0.0);
        if volume < 0.0 {
            return Err(DataError::Validation(format!(
                "row {row}: negative volume {volume}"
            )));
        }
        let close = self.close.unwrap_or(f64::NAN);
        Ok(Bar {
            date,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close,
            adj_close: self.adj_close.unwrap_or(close),
            volume: if volume.is_nan() { 0 } else { volume.round() as u64 },
            dividends: self.dividends.unwrap_or(0.0),
            splits: self.splits.unwrap_or(0.0),
            capital_gains: self.capital_gains.unwrap_or(0.0),
            repaired: self.repaired.unwrap_or(false),
        })
    }

    fn from_bar(bar: &Bar) -> Self {
        Self {
            date: format_date(&bar.date),
            open: finite_or_none(bar.open),
            high: finite_or_none(bar.high),
            low: finite_or_none(bar.low),
            close: finite_or_none(bar.close),
            adj_close: finite_or_none(bar.adj_close),
            volume: Some(bar.volume as f64),
            dividends: Some(bar.dividends),
            splits: Some(bar.splits),
            capital_gains: Some(bar.capital_gains),
            repaired: Some(bar.repaired),
        }
    }
}

/// Read bars from CSV. Dates must be strictly ascending.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<Bar> = Vec::new();
    for (i, record) in csv_reader.deserialize::<CsvBarRow>().enumerate() {
        // Row numbers in messages count the header as row 1.
        let row = i + 2;
        let bar = record?.into_bar(row)?;
        if let Some(last) = bars.last() {
            if bar.date <= last.date {
                return Err(DataError::Validation(format!(
                    "row {row}: date {} is not after {}",
                    bar.date, last.date
                )));
            }
        }
        bars.push(bar);
    }
    Ok(bars)
}

pub fn read_bars_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_bars(file)
}

pub fn write_bars<W: Write>(writer: W, bars: &[Bar]) -> Result<(), DataError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for bar in bars {
        csv_writer.serialize(CsvBarRow::from_bar(bar))?;
    }
    csv_writer.flush().map_err(|e| DataError::Csv(e.into()))?;
    Ok(())
}

pub fn write_bars_csv(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    let file = File::create(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_bars(file, bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,open,high,low,close,adj_close,volume,dividends,splits,capital_gains
2024-01-02,100.0,101.0,99.0,100.5,99.5,1000,0,0,0
2024-01-03,100.5,102.0,100.0,101.0,100.0,1200,0.25,0,0
2024-01-04,,,,,,0,0,2,0
";

    #[test]
    fn reads_sample() {
        let bars = read_bars(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date.date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].adj_close, 99.5);
        assert_eq!(bars[1].dividends, 0.25);
        assert!(bars[2].close.is_nan());
        assert!(bars[2].has_zero_price());
        assert_eq!(bars[2].splits, 2.0);
        assert!(!bars[0].repaired);
    }

    #[test]
    fn reads_yahoo_headers_and_intraday_dates() {
        let text = "\
Datetime,Open,High,Low,Close,Volume
2024-01-02 09:30:00,10,11,9,10.5,100
2024-01-02 09:31:00,10.5,11,10,10.8,90
";
        let bars = read_bars(text.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].adj_close, 10.8);
        assert_eq!(format_date(&bars[1].date), "2024-01-02 09:31:00");
    }

    #[test]
    fn rejects_unsorted_dates() {
        let text = "date,open,high,low,close\n2024-01-03,1,1,1,1\n2024-01-02,1,1,1,1\n";
        let err = read_bars(text.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn rejects_bad_date() {
        let text = "date,open,high,low,close\n01/02/2024,1,1,1,1\n";
        match read_bars(text.as_bytes()).unwrap_err() {
            DataError::InvalidDate { row, value } => {
                assert_eq!(row, 2);
                assert_eq!(value, "01/02/2024");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn write_then_read_preserves_bars() {
        let mut bars = read_bars(SAMPLE.as_bytes()).unwrap();
        bars[1].repaired = true;
        let mut buf = Vec::new();
        write_bars(&mut buf, &bars).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("date,open,high,low,close,adj_close,volume"));
        assert!(text.contains("\n2024-01-04,,,,,,"));

        let back = read_bars(buf.as_slice()).unwrap();
        assert_eq!(back[0], bars[0]);
        assert_eq!(back[1], bars[1]);
        assert!(back[2].close.is_nan());
    }
}
