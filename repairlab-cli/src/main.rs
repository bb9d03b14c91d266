//! RepairLab CLI: repair, analyze and check commands over CSV bar files.
//!
//! Commands:
//! - `repair`: repair one or more files, writing `<name>.repaired.csv`
//! - `analyze`: print what each corrector would find, as JSON
//! - `check`: verify that a second repair pass changes nothing

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use repairlab_core::config::RepairConfig;
use repairlab_core::data::{read_bars_csv, write_bars_csv};
use repairlab_core::domain::{Currency, Interval, OptionsError, QuoteType, RepairOptions};
use repairlab_core::repair::{RepairSummary, Repairer};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "repairlab", about = "RepairLab CLI: price-series repair engine")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair CSV bar files and write `<name>.repaired.csv` next to each input.
    Repair {
        /// Input CSV files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        instrument: InstrumentArgs,

        /// Write repaired files here instead of next to the inputs.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print per-stage diagnostics for one file as JSON. Nothing is written.
    Analyze {
        /// Input CSV file.
        file: PathBuf,

        #[command(flatten)]
        instrument: InstrumentArgs,
    },
    /// Repair each file twice in memory and fail if the second pass changes anything.
    Check {
        /// Input CSV files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        instrument: InstrumentArgs,
    },
}

/// Instrument description and stage switches. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
struct InstrumentArgs {
    /// Path to a TOML repair config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticker used in logs. Defaults to the file name.
    #[arg(long)]
    ticker: Option<String>,

    /// Bar interval (1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d, 5d, 1wk, 1mo, 3mo).
    #[arg(long)]
    interval: Option<Interval>,

    /// ISO currency code, e.g. USD, GBP, KWD.
    #[arg(long, value_parser = parse_currency)]
    currency: Option<Currency>,

    /// Quote type: EQUITY, ETF, MUTUALFUND, ...
    #[arg(long, value_parser = parse_quote_type)]
    quote_type: Option<QuoteType>,

    /// Switch a stage off. Repeatable.
    #[arg(long, value_enum)]
    disable: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Dividends,
    #[value(alias = "unit_mixups")]
    UnitMixups,
    Splits,
    Zeroes,
    #[value(alias = "capital_gains")]
    CapitalGains,
}

fn parse_currency(s: &str) -> Result<Currency, OptionsError> {
    Currency::new(s)
}

fn parse_quote_type(s: &str) -> Result<QuoteType, Infallible> {
    Ok(QuoteType::from(s))
}

impl InstrumentArgs {
    fn to_options(&self) -> Result<RepairOptions> {
        let mut options = match &self.config {
            Some(path) => RepairConfig::load(path)?.into_options(),
            None => RepairOptions::default(),
        };
        if let Some(ticker) = &self.ticker {
            options.ticker = Some(ticker.clone());
        }
        if let Some(interval) = self.interval {
            options.interval = interval;
        }
        if let Some(currency) = &self.currency {
            options.currency = currency.clone();
        }
        if let Some(quote_type) = &self.quote_type {
            options.quote_type = quote_type.clone();
        }
        for stage in &self.disable {
            let toggles = &mut options.toggles;
            match stage {
                Stage::Dividends => toggles.dividends = false,
                Stage::UnitMixups => toggles.unit_mixups = false,
                Stage::Splits => toggles.splits = false,
                Stage::Zeroes => toggles.zeroes = false,
                Stage::CapitalGains => toggles.capital_gains = false,
            }
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&logging::LogConfig::from_env().with_verbosity(cli.verbose))?;

    match cli.command {
        Commands::Repair {
            files,
            instrument,
            output_dir,
        } => run_repair(&files, &instrument, output_dir.as_deref()),
        Commands::Analyze { file, instrument } => run_analyze(&file, &instrument),
        Commands::Check { files, instrument } => run_check(&files, &instrument),
    }
}

/// Options for one file; the file stem stands in for a missing ticker.
fn options_for(base: &RepairOptions, path: &Path) -> RepairOptions {
    if base.ticker.is_some() {
        return base.clone();
    }
    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => base.clone().with_ticker(stem),
        None => base.clone(),
    }
}

fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bars".to_string());
    let name = format!("{stem}.repaired.csv");
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn repair_file(
    input: &Path,
    options: &RepairOptions,
    output_dir: Option<&Path>,
) -> Result<(PathBuf, RepairSummary)> {
    let bars = read_bars_csv(input)?;
    let repairer = Repairer::new(options_for(options, input));
    let (repaired, summary) = repairer.repair_with_summary(&bars);

    let out = output_path(input, output_dir);
    write_bars_csv(&out, &repaired)?;
    info!(
        ticker = repairer.options().label(),
        bars = summary.bar_count,
        repaired = summary.repaired_bars,
        output = %out.display(),
        hash = summary.output_hash.short(),
        "repaired file"
    );
    Ok((out, summary))
}

fn run_repair(files: &[PathBuf], instrument: &InstrumentArgs, output_dir: Option<&Path>) -> Result<()> {
    let options = instrument.to_options()?;
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let results: Vec<(&PathBuf, Result<(PathBuf, RepairSummary)>)> = files
        .par_iter()
        .map(|path| (path, repair_file(path, &options, output_dir)))
        .collect();

    let mut failures = 0;
    for (input, result) in &results {
        match result {
            Ok((out, summary)) => print_repair_line(input, out, summary),
            Err(e) => {
                failures += 1;
                eprintln!("Error for {}: {e:#}", input.display());
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} file(s) failed", files.len());
    }
    Ok(())
}

fn print_repair_line(input: &Path, out: &Path, summary: &RepairSummary) {
    let stages: Vec<String> = summary
        .stages
        .iter()
        .filter(|s| s.newly_flagged > 0)
        .map(|s| format!("{} {}", s.stage, s.newly_flagged))
        .collect();
    let detail = if stages.is_empty() {
        "no changes".to_string()
    } else {
        stages.join(", ")
    };
    println!(
        "{}: {} bars, {} repaired ({detail}) -> {}",
        input.display(),
        summary.bar_count,
        summary.repaired_bars,
        out.display()
    );
}

fn run_analyze(file: &Path, instrument: &InstrumentArgs) -> Result<()> {
    let options = options_for(&instrument.to_options()?, file);
    let bars = read_bars_csv(file)?;
    let analysis = Repairer::new(options).analyze(&bars);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

/// Whether repairing an already repaired series is a no-op.
fn is_stable(input: &Path, options: &RepairOptions) -> Result<bool> {
    let bars = read_bars_csv(input)?;
    let repairer = Repairer::new(options_for(options, input));
    let once = repairer.repair(&bars);
    let (_, second) = repairer.repair_with_summary(&once);
    if second.changed() {
        warn!(
            ticker = repairer.options().label(),
            flagged = second.repaired_bars,
            "second repair pass changed the series"
        );
    }
    Ok(!second.changed())
}

fn run_check(files: &[PathBuf], instrument: &InstrumentArgs) -> Result<()> {
    let options = instrument.to_options()?;
    let results: Vec<(&PathBuf, Result<bool>)> = files
        .par_iter()
        .map(|path| (path, is_stable(path, &options)))
        .collect();

    let mut unstable = 0;
    for (input, result) in &results {
        match result {
            Ok(true) => println!("{}: ok", input.display()),
            Ok(false) => {
                unstable += 1;
                println!("{}: UNSTABLE (second pass changed bars)", input.display());
            }
            Err(e) => {
                unstable += 1;
                eprintln!("Error for {}: {e:#}", input.display());
            }
        }
    }
    if unstable > 0 {
        bail!("{unstable} of {} file(s) failed the check", files.len());
    }
    Ok(())
}
