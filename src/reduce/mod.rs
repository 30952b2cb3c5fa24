// src/reduce/mod.rs
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use csv::Writer;
use glob::glob;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::aggregate::{aggregate_partition, parse_records, YearlyStats};
use crate::error::ReduceError;
use crate::rates::RateLookup;
use crate::record::VacancyRecord;

/// All `*.csv` partition files directly under `dir`, sorted by path.
pub fn discover_partitions<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.csv", dir.as_ref().display());
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("invalid glob pattern {}", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool, ReduceError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("reduce-{}", i))
        .build()?)
}

/// Union per-partition results, refusing any year produced by two partitions.
pub fn merge_disjoint<I>(results: I) -> Result<YearlyStats, ReduceError>
where
    I: IntoIterator<Item = (PathBuf, YearlyStats)>,
{
    let mut owners: BTreeMap<i32, PathBuf> = BTreeMap::new();
    let mut merged = YearlyStats::default();

    for (path, stats) in results {
        for year in stats.years() {
            if let Some(first) = owners.get(&year) {
                return Err(ReduceError::YearCollision {
                    year,
                    first: first.clone(),
                    second: path,
                });
            }
        }
        for year in stats.years() {
            owners.insert(year, path.clone());
        }
        merged.absorb(stats);
    }
    Ok(merged)
}

/// Aggregate every partition on a fixed-size pool and merge the results.
///
/// Any failing partition fails the whole run; no partial statistics are
/// returned.
#[instrument(level = "info", skip(paths, rates, profession), fields(partitions = paths.len()))]
pub fn reduce_partitions<L>(
    paths: &[PathBuf],
    rates: &L,
    profession: &str,
    workers: usize,
) -> Result<YearlyStats, ReduceError>
where
    L: RateLookup + ?Sized,
{
    let start = Instant::now();
    let pool = build_pool(workers)?;

    let results: Vec<(PathBuf, YearlyStats)> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let stats = aggregate_partition(path, rates, profession).map_err(|source| {
                    ReduceError::Worker {
                        path: path.clone(),
                        source,
                    }
                })?;
                debug!(path = %path.display(), years = stats.count_by_year.len(), "partition done");
                Ok((path.clone(), stats))
            })
            .collect::<Result<Vec<_>, ReduceError>>()
    })?;

    let merged = merge_disjoint(results)?;
    info!(
        years = merged.count_by_year.len(),
        elapsed = ?start.elapsed(),
        "reduce complete"
    );
    Ok(merged)
}

/// Write every record of every partition to one CSV of
/// `name,salary,area_name,published_at`, partitions in path order.
///
/// Partitions are parsed in parallel; rows are written by the caller thread.
#[instrument(level = "info", skip(paths, rates, out), fields(partitions = paths.len()))]
pub fn export_normalized<L>(
    paths: &[PathBuf],
    rates: &L,
    workers: usize,
    out: &Path,
) -> Result<u64>
where
    L: RateLookup + ?Sized,
{
    let pool = build_pool(workers)?;
    let parsed: Vec<Vec<VacancyRecord>> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| read_records(path, rates))
            .collect::<Result<Vec<_>>>()
    })?;

    let file = File::create(out).with_context(|| format!("creating {:?}", out))?;
    let mut writer = Writer::from_writer(BufWriter::new(file));
    writer.write_record(["name", "salary", "area_name", "published_at"])?;

    let mut written = 0u64;
    for rec in parsed.iter().flatten() {
        writer.write_record([
            rec.name.as_str(),
            rec.averaged_salary.normalize().to_string().as_str(),
            rec.area_name.as_str(),
            rec.published_at.as_str(),
        ])?;
        written += 1;
    }
    writer.flush()?;
    info!(rows = written, out = %out.display(), "normalized export written");
    Ok(written)
}

fn read_records<L: RateLookup + ?Sized>(path: &Path, rates: &L) -> Result<Vec<VacancyRecord>> {
    let file = File::open(path).with_context(|| format!("opening partition {:?}", path))?;
    parse_records(BufReader::new(file), rates).with_context(|| format!("parsing {:?}", path))
}
