// src/rates/mod.rs
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use csv::ReaderBuilder;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::RateError;
use crate::record::YearMonth;

pub const DEFAULT_BASE_CURRENCY: &str = "RUR";

/// Anything that can convert a currency to the base currency for a month.
///
/// Implementations return `Decimal::ZERO` for a month or currency they know
/// nothing about; callers treat that as "unconvertible", not as an error.
pub trait RateLookup: Send + Sync {
    fn rate(&self, month: YearMonth, currency: &str) -> Decimal;
}

/// Precomputed month × currency table, read-only once loaded.
#[derive(Debug, Clone)]
pub struct RateTable {
    base: String,
    rows: HashMap<YearMonth, HashMap<String, Decimal>>,
}

impl RateTable {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            rows: HashMap::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn insert(&mut self, month: YearMonth, currency: impl Into<String>, rate: Decimal) {
        self.rows
            .entry(month)
            .or_default()
            .insert(currency.into(), rate);
    }

    pub fn months(&self) -> usize {
        self.rows.len()
    }

    /// Load the cached table written by the rate fetcher: a `date` column of
    /// `MM/YYYY` keys followed by one column per currency code. Empty cells
    /// are treated as absent.
    pub fn from_reader<R: Read>(base: impl Into<String>, reader: R) -> Result<Self, RateError> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let mut cols = headers.iter();
        match cols.next().map(|h| h.trim_start_matches('\u{feff}').trim()) {
            Some("date") => {}
            _ => return Err(RateError::MissingDateColumn),
        }
        let codes: Vec<String> = cols.map(|c| c.trim().to_string()).collect();

        let mut table = Self::new(base);
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let month: YearMonth = record
                .get(0)
                .unwrap_or_default()
                .parse()
                .map_err(|source| RateError::Date { line, source })?;

            for (code, cell) in codes.iter().zip(record.iter().skip(1)) {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                let rate: Decimal = cell.parse().map_err(|_| RateError::Rate {
                    line,
                    code: code.clone(),
                    value: cell.to_string(),
                })?;
                table.insert(month, code.as_str(), rate);
            }
        }
        debug!(months = table.months(), currencies = codes.len(), "rate table parsed");
        Ok(table)
    }

    pub fn from_csv_path<P: AsRef<Path>>(
        base: impl Into<String>,
        path: P,
    ) -> Result<Self, RateError> {
        let file = File::open(path.as_ref())?;
        let table = Self::from_reader(base, BufReader::new(file))?;
        info!(
            path = %path.as_ref().display(),
            base = table.base(),
            months = table.months(),
            "loaded rate cache"
        );
        Ok(table)
    }
}

impl RateLookup for RateTable {
    fn rate(&self, month: YearMonth, currency: &str) -> Decimal {
        if currency == self.base {
            return Decimal::ONE;
        }
        self.rows
            .get(&month)
            .and_then(|row| row.get(currency))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Every month from `first` to `last`, inclusive. Empty if `last < first`.
pub fn month_span(first: YearMonth, last: YearMonth) -> Vec<YearMonth> {
    let mut out = Vec::new();
    let mut cur = first;
    while cur <= last {
        out.push(cur);
        cur = cur.next();
    }
    out
}
