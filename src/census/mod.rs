// src/census/mod.rs
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
};

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use rayon::prelude::*;
use tracing::info;

use crate::record::{clean_cell, SALARY_CURRENCY};

/// How many vacancies quote each currency code.
pub type CurrencyCounts = BTreeMap<String, u64>;

pub fn count_reader<R: Read>(reader: R) -> Result<CurrencyCounts> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let idx = rdr
        .headers()?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == SALARY_CURRENCY)
        .ok_or_else(|| anyhow!("no `{}` column", SALARY_CURRENCY))?;

    let mut counts = CurrencyCounts::new();
    for row in rdr.records() {
        let row = row?;
        let code = row.get(idx).map(clean_cell).unwrap_or_default();
        if !code.is_empty() {
            *counts.entry(code).or_default() += 1;
        }
    }
    Ok(counts)
}

/// Count currencies across partitions in parallel. Unlike yearly statistics
/// the same code shows up in many partitions, so results are summed.
pub fn count_currencies(paths: &[PathBuf]) -> Result<CurrencyCounts> {
    let per_file: Vec<CurrencyCounts> = paths
        .par_iter()
        .map(|path| {
            let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
            count_reader(BufReader::new(file)).with_context(|| format!("counting {:?}", path))
        })
        .collect::<Result<_>>()?;

    let total = per_file.into_iter().fold(CurrencyCounts::new(), |mut acc, counts| {
        for (code, n) in counts {
            *acc.entry(code).or_default() += n;
        }
        acc
    });
    info!(currencies = total.len(), "currency census complete");
    Ok(total)
}

/// Codes quoted more than `min_count` times, most frequent first, excluding
/// the base currency. These are the columns a rate cache needs.
pub fn frequent_currencies(counts: &CurrencyCounts, base: &str, min_count: u64) -> Vec<String> {
    let mut codes: Vec<(&String, &u64)> = counts
        .iter()
        .filter(|(code, n)| code.as_str() != base && **n > min_count)
        .collect();
    codes.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    codes.into_iter().map(|(code, _)| code.clone()).collect()
}
