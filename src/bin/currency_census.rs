// src/bin/currency_census.rs
//
// Count how often each currency is quoted across the yearly partitions and
// list the months a rate cache has to cover.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use vacstats::{
    census::{count_currencies, frequent_currencies},
    rates::{month_span, DEFAULT_BASE_CURRENCY},
    record::{YearMonth, PUBLISHED_AT},
    reduce::discover_partitions,
};

#[derive(Parser)]
#[command(about = "Currency frequencies and month span for a partitions directory")]
struct Args {
    #[arg(default_value = "vacancies_by_year")]
    partitions: PathBuf,
    /// Only list currencies quoted more often than this.
    #[arg(long, default_value_t = 5000)]
    min_count: u64,
    #[arg(long, default_value = DEFAULT_BASE_CURRENCY)]
    base_currency: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let paths = discover_partitions(&args.partitions)?;
    if paths.is_empty() {
        bail!("no partitions under {}", args.partitions.display());
    }
    info!("found {} partitions", paths.len());

    let counts = count_currencies(&paths)?;
    for (code, n) in &counts {
        println!("{code}\t{n}");
    }

    let wanted = frequent_currencies(&counts, &args.base_currency, args.min_count);
    println!("rate cache columns: date,{}", wanted.join(","));

    // partitions are sorted by name, which sorts them by year
    let first = edge_month(&paths[0], true)?;
    let last = edge_month(&paths[paths.len() - 1], false)?;
    let months = month_span(first, last);
    println!(
        "rate cache rows: {} months, {} .. {}",
        months.len(),
        first,
        last
    );
    Ok(())
}

/// Publication month of the first (or last) row of a partition.
fn edge_month(path: &Path, first: bool) -> Result<YearMonth> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("opening {:?}", path))?;
    let idx = rdr
        .headers()?
        .iter()
        .position(|h| h == PUBLISHED_AT)
        .with_context(|| format!("no {} column in {:?}", PUBLISHED_AT, path))?;

    let mut edge = None;
    for row in rdr.records() {
        let row = row?;
        let cell = row.get(idx).unwrap_or_default();
        edge = Some(cell.to_string());
        if first {
            break;
        }
    }
    let edge = edge.with_context(|| format!("{:?} has no rows", path))?;
    Ok(YearMonth::from_published_at(&edge)?)
}
