use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Calendar month a vacancy was published in. Orders by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Parse an ISO-like `published_at` such as `2022-01-01T00:00:00+0300`.
    /// The month is taken in the timestamp's own offset, never shifted to UTC.
    pub fn from_published_at(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
            return Ok(Self {
                year: dt.year(),
                month: dt.month(),
            });
        }
        // Some extracts drop the time part or carry a non-standard offset.
        s.get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| Self {
                year: d.year(),
                month: d.month(),
            })
            .ok_or_else(|| ParseError::PublishedAt(s.to_string()))
    }

    /// The following calendar month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

/// Rendered as `MM/YYYY`, the rate cache key format.
impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl FromStr for YearMonth {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::YearMonth(s.to_string());
        let (month, year) = s.trim().split_once('/').ok_or_else(bad)?;
        let month: u32 = month.parse().map_err(|_| bad())?;
        let year: i32 = year.parse().map_err(|_| bad())?;
        Self::new(year, month).ok_or_else(bad)
    }
}
