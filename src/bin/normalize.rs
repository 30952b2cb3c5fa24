// src/bin/normalize.rs
//
// Re-read every yearly partition and write one CSV of
// name, converted average salary, area and publication date.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vacstats::{
    rates::{RateTable, DEFAULT_BASE_CURRENCY},
    reduce::{discover_partitions, export_normalized},
};

#[derive(Parser)]
#[command(about = "Export partitions as one normalized vacancies CSV")]
struct Args {
    #[arg(default_value = "vacancies_by_year")]
    partitions: PathBuf,
    #[arg(short, long, default_value = "vacancies.csv")]
    output: PathBuf,
    #[arg(long)]
    rates: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_BASE_CURRENCY)]
    base_currency: String,
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let paths = discover_partitions(&args.partitions)?;
    if paths.is_empty() {
        bail!("no partitions under {}", args.partitions.display());
    }

    let rates = match &args.rates {
        Some(path) => RateTable::from_csv_path(&args.base_currency, path)?,
        None => RateTable::new(args.base_currency.clone()),
    };
    let workers = args.workers.unwrap_or_else(num_cpus::get);

    let rows = export_normalized(&paths, &rates, workers, &args.output)?;
    info!("wrote {} rows to {}", rows, args.output.display());
    Ok(())
}
