// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// Failures turning one normalized row into a `VacancyRecord`.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("column `{0}` is missing from the row")]
    MissingColumn(&'static str),
    #[error("salary field `{field}` is not a decimal: {value:?}")]
    Salary {
        field: &'static str,
        value: String,
        #[source]
        source: rust_decimal::Error,
    },
    #[error("published_at is not a recognised date: {0:?}")]
    PublishedAt(String),
    #[error("invalid month/year {0:?}, expected MM/YYYY")]
    YearMonth(String),
    #[error("averaged salary of {from:?}..{to:?} {currency} at rate {rate} is out of range")]
    SalaryOverflow {
        from: Option<rust_decimal::Decimal>,
        to: Option<rust_decimal::Decimal>,
        currency: String,
        rate: rust_decimal::Decimal,
    },
}

/// Failures folding records into yearly totals.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("salary sum for {year} is out of range")]
    SumOverflow { year: i32 },
    #[error("average salary {average} for {year} does not fit in i64")]
    AverageOutOfRange {
        year: i32,
        average: rust_decimal::Decimal,
    },
}

#[derive(Debug, Error)]
pub enum RateError {
    #[error("could not read rate cache")]
    Io(#[from] std::io::Error),
    #[error("could not parse rate cache CSV")]
    Csv(#[from] csv::Error),
    #[error("rate cache has no `date` column as its first header")]
    MissingDateColumn,
    #[error("rate cache line {line}: {source}")]
    Date {
        line: u64,
        #[source]
        source: ParseError,
    },
    #[error("rate cache line {line}: {code} rate {value:?} is not a decimal")]
    Rate {
        line: u64,
        code: String,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("output directory {0} already exists; clear it before re-running")]
    OutputExists(PathBuf),
    #[error("input file has no header row")]
    MissingHeader,
    #[error("header has no `{0}` column")]
    MissingColumn(&'static str),
    #[error("input is not sorted by published_at: year {year} reappears at line {line}")]
    Unsorted { year: i32, line: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("year {year} produced by both {first} and {second}")]
    YearCollision {
        year: i32,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("aggregating {path} failed")]
    Worker {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
