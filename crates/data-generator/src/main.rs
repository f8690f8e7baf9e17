//! data-generator: write a synthetic Tampa sale history for model training.
//!
//! Usage:
//!   cargo run -p data-generator
//!   cargo run -p data-generator -- --houses 5000 --seed 7 --out data/big.csv
//!   cargo run -p data-generator -- --end-date 2026-01-01

mod generator;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use std::path::Path;

use generator::{generate, write_csv, GeneratorConfig};

const DEFAULT_OUT: &str = "data/housing_data_tampa.csv";

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match arg_value(args, flag) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {flag}: {raw:?}")),
        None => Ok(default),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_generator=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage:");
        eprintln!("  data-generator [options]");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --houses N           Number of houses (default 1000)");
        eprintln!("  --neighborhoods N    Number of neighborhoods (default 10)");
        eprintln!("  --days N             Days of history (default 365)");
        eprintln!("  --seed N             RNG seed (default 42)");
        eprintln!("  --end-date DATE      Last day of history, YYYY-MM-DD (default today)");
        eprintln!("  --out PATH           Output CSV (default {DEFAULT_OUT})");
        std::process::exit(1);
    }

    let end_date = match arg_value(&args, "--end-date") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid --end-date {raw:?}"))?,
        None => Utc::now().date_naive(),
    };
    let defaults = GeneratorConfig::new(end_date);
    let config = GeneratorConfig {
        num_houses: parse_arg(&args, "--houses", defaults.num_houses)?,
        num_neighborhoods: parse_arg(&args, "--neighborhoods", defaults.num_neighborhoods)?,
        history_days: parse_arg(&args, "--days", defaults.history_days)?,
        seed: parse_arg(&args, "--seed", defaults.seed)?,
        ..defaults
    };
    let out = Path::new(arg_value(&args, "--out").unwrap_or(DEFAULT_OUT));

    tracing::info!(
        "Generating {} houses across {} neighborhoods ({} days ending {}, seed {})",
        config.num_houses,
        config.num_neighborhoods,
        config.history_days,
        config.end_date,
        config.seed
    );
    let records = generate(&config)?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let file = std::fs::File::create(out).with_context(|| format!("cannot create {}", out.display()))?;
    write_csv(&records, std::io::BufWriter::new(file))?;

    let gems = records.iter().filter(|r| r.is_undervalued).count();
    tracing::info!(
        "Wrote {} records for {} houses ({} discounted) to {}",
        records.len(),
        config.num_houses,
        gems,
        out.display()
    );
    Ok(())
}
