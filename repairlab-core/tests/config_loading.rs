//! Config files on disk drive the pipeline.

use repairlab_core::config::{ConfigError, RepairConfig};
use repairlab_core::domain::{Bar, Interval, QuoteType};
use repairlab_core::repair::Repairer;

fn write_config(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("repair.toml");
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn config_file_selects_options_and_stages() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[instrument]
ticker = "VWELX"
interval = "1d"
quote_type = "mutualfund"

[correctors]
zeroes = false
"#,
    );

    let options = RepairConfig::load(&path).unwrap().into_options();
    assert_eq!(options.label(), "VWELX");
    assert_eq!(options.interval, Interval::Day1);
    assert_eq!(options.quote_type, QuoteType::MutualFund);

    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars: Vec<Bar> = (0..3)
        .map(|i| {
            let price = if i == 1 { 0.0 } else { 10.0 };
            Bar::new(date + chrono::Duration::days(i), price, price, price, price, 100)
        })
        .collect();

    let (out, summary) = Repairer::new(options).repair_with_summary(&bars);
    assert_eq!(out[1].close, 0.0, "zero repair is switched off");
    let zeroes = summary.stages.iter().find(|s| s.stage == "zeroes").unwrap();
    assert!(!zeroes.enabled);
}

#[test]
fn bad_currency_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[instrument]\ncurrency = \"US\"\n");
    let err = RepairConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
