//! Integration tests for CSV bar files using the frozen defective fixture.
//!
//! The fixture carries three defects: a zero bar with volume (2024-03-05),
//! a ×100 unit mixup (2024-03-08) and a dividend that was never applied to
//! adjusted close (2024-03-15).

use std::path::PathBuf;

use repairlab_core::data::{read_bars_csv, write_bars_csv, DataError};
use repairlab_core::domain::RepairOptions;
use repairlab_core::repair::Repairer;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/defective_daily.csv")
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "{what}: expected {expected}, got {actual}"
    );
}

#[test]
fn fixture_loads() {
    let bars = read_bars_csv(&fixture_path()).unwrap();
    assert_eq!(bars.len(), 12);
    assert_eq!(bars[2].volume, 900);
    assert!(bars[2].has_zero_price());
    assert_eq!(bars[10].dividends, 0.3);
    assert!(bars.iter().all(|b| !b.repaired));
    assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
}

#[test]
fn fixture_repairs_all_three_defects() {
    let bars = read_bars_csv(&fixture_path()).unwrap();
    let (out, summary) = Repairer::new(RepairOptions::default().with_ticker("FIXT"))
        .repair_with_summary(&bars);

    let factor = 1.0 - 0.3 / 51.0;

    // Unit mixup restored to the neighbouring scale.
    assert_close(out[5].close, 50.60, "mixup close");
    assert_close(out[5].open, 50.30, "mixup open");
    assert_close(out[5].adj_close, 50.60 * factor, "mixup adj_close");

    // Zero bar interpolated from 50.20 (prev close) and 50.10 (next open).
    assert_close(out[2].open, 50.15, "zero open");
    assert_close(out[2].close, 50.15, "zero close");
    assert_close(out[2].high, 50.20, "zero high");
    assert_close(out[2].low, 50.10, "zero low");
    assert_close(out[2].adj_close, 50.15 * factor, "zero adj_close");
    assert_eq!(out[2].volume, 900);

    // Dividend adjustment applied to every earlier bar.
    for i in [0, 1, 3, 4, 6, 7, 8, 9] {
        assert_close(out[i].adj_close, bars[i].close * factor, "adjusted history");
        assert_eq!(out[i].close, bars[i].close);
    }

    assert!(out[..10].iter().all(|b| b.repaired));
    assert_eq!(out[10], bars[10]);
    assert_eq!(out[11], bars[11]);
    assert_eq!(summary.repaired_bars, 10);
    assert!(summary.changed());
}

#[test]
fn repaired_file_round_trips_through_disk() {
    let bars = read_bars_csv(&fixture_path()).unwrap();
    let repaired = Repairer::new(RepairOptions::default()).repair(&bars);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.repaired.csv");
    write_bars_csv(&path, &repaired).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().next().unwrap().ends_with(",repaired"));

    let back = read_bars_csv(&path).unwrap();
    assert_eq!(back, repaired);

    // Repairing the repaired file changes nothing.
    let again = Repairer::new(RepairOptions::default()).repair(&back);
    assert_eq!(again, back);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = read_bars_csv(&PathBuf::from("/nonexistent/bars.csv")).unwrap_err();
    assert!(matches!(err, DataError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/bars.csv"));
}
