//! fx-features CLI - stage rates, compute features, inspect snapshots
//!
//! ## Example Usage
//!
//! ```bash
//! # Stage vendor CSVs into the exchange-rate snapshot
//! fx-features stage --spot-csv fx_spot.csv --points-csv fx_fwrd_points.csv
//!
//! # Recompute 3M carry for January
//! fx-features carry --start 2024-01-01 --end 2024-01-31
//!
//! # One-day total returns for two currencies
//! fx-features returns --ccy EUR,MXN --tenor 3M --lag 1
//!
//! # Row count and schema of a snapshot
//! fx-features inspect ~/.fx-features/data/features/fx/daily/fx_carry.parquet
//! ```

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fx_feature_store::calendar::next_imm_date;
use fx_feature_store::config::FeatureStoreConfig;
use fx_feature_store::data::stage_exchange_rates;
use fx_feature_store::features::Tenor;
use fx_feature_store::pipeline::{
    fx_carry_to_snapshot, fx_returns_to_snapshot, CarryParams, JobReport, ReturnParams,
};
use fx_feature_store::store::{SnapshotStore, UpsertSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// fx-features: FX carry and return feature snapshots
#[derive(Parser)]
#[command(name = "fx-features")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "FX carry and return feature snapshots", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage wide spot and forward-point CSVs into the exchange-rate snapshot
    Stage {
        #[arg(long, value_name = "CSV")]
        spot_csv: PathBuf,

        #[arg(long, value_name = "CSV")]
        points_csv: PathBuf,

        /// Override the configured exchange-rate snapshot
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Compute FX carry from spot and forward rates
    Carry {
        /// Start date (YYYY-MM-DD)
        #[arg(short = 's', long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(short = 'e', long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Currency codes, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        ccy: Option<Vec<String>>,

        /// Forward tenors in calendar days
        #[arg(long, value_delimiter = ',', default_value = "90")]
        tenor_days: Vec<i64>,
    },

    /// Compute FX spot, carry and total returns
    Returns {
        /// Start date (YYYY-MM-DD)
        #[arg(short = 's', long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(short = 'e', long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Currency codes, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        ccy: Option<Vec<String>>,

        /// Carry tenor (1M, 3M, 6M, 1Y)
        #[arg(long, default_value = "3M")]
        tenor: Tenor,

        /// Holding period in observation dates
        #[arg(long, default_value_t = 1)]
        lag: u32,
    },

    /// Show row count and schema of a snapshot
    Inspect {
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,
    },

    /// Show the next IMM date
    Imm {
        /// Reference date (default: today)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Number of IMM dates to shift by
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i32,
    },

    /// Show resolved configuration
    Info,
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", raw, e))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn print_summary(summary: &UpsertSummary) {
    if summary.is_noop() {
        println!("  {}", "Nothing to write, snapshot unchanged".yellow());
        return;
    }
    if summary.created {
        println!("  {} created", "Snapshot:".bold());
    }
    println!("  {} {}", "Rows inserted:".bold(), summary.rows_inserted);
    println!("  {} {}", "Rows replaced:".bold(), summary.rows_replaced);
    println!("  {} {}", "Rows retained:".bold(), summary.rows_retained);
    println!("  {} {}", "Snapshot rows:".bold(), summary.rows_written);
    if summary.duplicates_dropped > 0 {
        println!(
            "  {} {}",
            "Duplicate keys dropped:".bold(),
            summary.duplicates_dropped
        );
    }
}

fn print_job(name: &str, output: &std::path::Path, report: &JobReport) {
    println!("{}", format!("{} Summary", name).green().bold());
    println!("  {} {}", "Output:".bold(), output.display());
    println!("  {} {}", "Rows computed:".bold(), report.rows_computed);
    println!("  {} {}", "Rows dropped:".bold(), report.rows_dropped);
    print_summary(&report.summary);
}

fn run(cli: Cli) -> Result<()> {
    let config = FeatureStoreConfig::load(cli.config.as_deref())?;
    let store = SnapshotStore::new(config.store.clone());

    if cli.verbose {
        println!(
            "{} v{}",
            "fx-features".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!("Data dir: {}", config.data_dir.display().to_string().dimmed());
    }

    match cli.command {
        Commands::Stage {
            spot_csv,
            points_csv,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.exchange_rates_path());
            let pb = spinner("Staging exchange rates...");
            let report =
                stage_exchange_rates(&store, &spot_csv, &points_csv, &output, &config.staging)
                    .with_context(|| format!("staging into {}", output.display()));
            pb.finish_and_clear();
            let report = report?;

            println!("{}", "Staging Summary".green().bold());
            println!("  {} {}", "Output:".bold(), output.display());
            println!("  {} {}", "Spot rows:".bold(), report.spot_rows);
            println!("  {} {}", "Forward rows:".bold(), report.forward_rows);
            if report.orphan_points > 0 {
                println!(
                    "  {} {}",
                    "Points without spot:".yellow().bold(),
                    report.orphan_points
                );
            }
            print_summary(&report.summary);
        }

        Commands::Carry {
            start,
            end,
            ccy,
            tenor_days,
        } => {
            let output = config.fx_carry_path();
            let params = CarryParams {
                start,
                end,
                currencies: ccy.map(|codes| codes.iter().map(|c| c.to_uppercase()).collect()),
                tenor_days,
            };
            let pb = spinner("Computing FX carry...");
            let report = fx_carry_to_snapshot(&store, &config.exchange_rates_path(), &output, &params)
                .context("computing FX carry");
            pb.finish_and_clear();
            print_job("FX Carry", &output, &report?);
        }

        Commands::Returns {
            start,
            end,
            ccy,
            tenor,
            lag,
        } => {
            let output = config.fx_returns_path();
            let params = ReturnParams {
                start,
                end,
                currencies: ccy.map(|codes| codes.iter().map(|c| c.to_uppercase()).collect()),
                tenor,
                n_days: lag,
            };
            let pb = spinner("Computing FX returns...");
            let report = fx_returns_to_snapshot(
                &store,
                &config.exchange_rates_path(),
                &config.fx_carry_path(),
                &output,
                &params,
            )
            .context("computing FX returns");
            pb.finish_and_clear();
            print_job("FX Returns", &output, &report?);
        }

        Commands::Inspect { snapshot } => {
            let rows = store
                .row_count(&snapshot)
                .with_context(|| format!("reading {}", snapshot.display()))?;
            let schema = store.schema(&snapshot)?;

            println!("{}", snapshot.display().to_string().cyan().bold());
            println!("  {} {}", "Rows:".bold(), rows);
            println!("  {}", "Columns:".bold());
            for (name, dtype) in schema.iter() {
                println!("    {} {}", name, dtype.to_string().dimmed());
            }
        }

        Commands::Imm { from, offset } => {
            let from = from.unwrap_or_else(|| Local::now().date_naive());
            let date = next_imm_date(from, offset)?;
            println!("{}", date);
        }

        Commands::Info => {
            println!(
                "{} {}",
                "fx-features".cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
            println!("{}", env!("CARGO_PKG_DESCRIPTION"));
            println!();
            println!("{}", "Configuration".bold());
            println!("  {} {}", "Data dir:".bold(), config.data_dir.display());
            println!(
                "  {} {}",
                "Exchange rates:".bold(),
                config.exchange_rates_path().display()
            );
            println!("  {} {}", "FX carry:".bold(), config.fx_carry_path().display());
            println!("  {} {}", "FX returns:".bold(), config.fx_returns_path().display());
            println!("  {} {}", "Streaming:".bold(), config.store.streaming);
            println!("  {} {:?}", "Compression:".bold(), config.store.compression);
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
