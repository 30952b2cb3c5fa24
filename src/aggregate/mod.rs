// src/aggregate/mod.rs
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::AggregateError;
use crate::rates::RateLookup;
use crate::record::{RecordParser, VacancyRecord};

/// Running (sum, count) for one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearAccumulator {
    pub salary_sum: Decimal,
    pub count: u64,
}

impl YearAccumulator {
    /// `None` if the sum would leave the `Decimal` range; the accumulator is
    /// left unchanged then.
    pub fn add(&mut self, salary: Decimal) -> Option<()> {
        self.salary_sum = self.salary_sum.checked_add(salary)?;
        self.count += 1;
        Some(())
    }

    /// Exact mean, or 0 for an empty (gap-filled) year.
    pub fn mean(&self) -> Decimal {
        if self.count == 0 {
            return Decimal::ZERO;
        }
        self.salary_sum / Decimal::from(self.count)
    }

    /// Floor of the mean. `None` if it does not fit in an `i64`.
    pub fn average(&self) -> Option<i64> {
        self.mean().floor().to_i64()
    }
}

pub type YearTotals = BTreeMap<i32, YearAccumulator>;

/// Fold records into per-year totals.
pub fn fold_by_year<'a, I>(records: I) -> Result<YearTotals, AggregateError>
where
    I: IntoIterator<Item = &'a VacancyRecord>,
{
    let mut totals = YearTotals::new();
    for rec in records {
        totals
            .entry(rec.year)
            .or_default()
            .add(rec.averaged_salary)
            .ok_or(AggregateError::SumOverflow { year: rec.year })?;
    }
    Ok(totals)
}

/// Give `filtered` a zero entry for every year `all` has and it lacks.
pub fn fill_missing_years(all: &YearTotals, filtered: &mut YearTotals) {
    for year in all.keys() {
        filtered.entry(*year).or_default();
    }
}

/// The four year-indexed mappings the reports are drawn from. Keys ascend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyStats {
    pub salary_by_year: BTreeMap<i32, i64>,
    pub count_by_year: BTreeMap<i32, u64>,
    pub profession_salary_by_year: BTreeMap<i32, i64>,
    pub profession_count_by_year: BTreeMap<i32, u64>,
}

impl YearlyStats {
    pub fn from_totals(
        all: &YearTotals,
        profession: &YearTotals,
    ) -> Result<Self, AggregateError> {
        let (salary_by_year, count_by_year) = split_totals(all)?;
        let (profession_salary_by_year, profession_count_by_year) = split_totals(profession)?;
        Ok(Self {
            salary_by_year,
            count_by_year,
            profession_salary_by_year,
            profession_count_by_year,
        })
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.count_by_year.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.count_by_year.is_empty()
    }

    /// Move every entry of `other` into `self`. Callers are expected to have
    /// checked that the year sets are disjoint.
    pub fn absorb(&mut self, other: YearlyStats) {
        self.salary_by_year.extend(other.salary_by_year);
        self.count_by_year.extend(other.count_by_year);
        self.profession_salary_by_year
            .extend(other.profession_salary_by_year);
        self.profession_count_by_year
            .extend(other.profession_count_by_year);
    }
}

type YearMaps = (BTreeMap<i32, i64>, BTreeMap<i32, u64>);

fn split_totals(totals: &YearTotals) -> Result<YearMaps, AggregateError> {
    let mut salary = BTreeMap::new();
    let mut count = BTreeMap::new();
    for (year, acc) in totals {
        let average = acc.average().ok_or(AggregateError::AverageOutOfRange {
            year: *year,
            average: acc.mean(),
        })?;
        salary.insert(*year, average);
        count.insert(*year, acc.count);
    }
    Ok((salary, count))
}

/// Overall and profession-filtered yearly statistics for a record set.
///
/// The profession filter is a case-sensitive substring match on `name`.
pub fn aggregate(
    records: &[VacancyRecord],
    profession: &str,
) -> Result<YearlyStats, AggregateError> {
    let all = fold_by_year(records)?;
    let mut matched = fold_by_year(records.iter().filter(|r| r.name.contains(profession)))?;
    fill_missing_years(&all, &mut matched);
    YearlyStats::from_totals(&all, &matched)
}

/// Parse every row of a partition-shaped CSV into records.
///
/// Header names are trimmed and a leading BOM is dropped, so externally
/// produced files read the same as partitions. Any bad row fails the read.
pub fn parse_records<R, L>(reader: R, rates: &L) -> Result<Vec<VacancyRecord>>
where
    R: Read,
    L: RateLookup + ?Sized,
{
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("reading partition header")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let parser = RecordParser::new(rates);

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result.context("reading partition row")?;
        let line = row.position().map_or(0, |p| p.line());
        let cells: Vec<String> = row.iter().map(str::to_string).collect();
        let rec = parser
            .parse_row(&headers, &cells)
            .with_context(|| format!("line {}", line))?;
        records.push(rec);
    }
    debug!(records = records.len(), "partition parsed");
    Ok(records)
}

/// Parse every row of one partition and aggregate it.
///
/// A malformed salary aborts the whole partition.
pub fn aggregate_reader<R, L>(reader: R, rates: &L, profession: &str) -> Result<YearlyStats>
where
    R: Read,
    L: RateLookup + ?Sized,
{
    let records = parse_records(reader, rates)?;
    Ok(aggregate(&records, profession)?)
}

#[instrument(level = "debug", skip(path, rates, profession), fields(path = %path.as_ref().display()))]
pub fn aggregate_partition<P, L>(path: P, rates: &L, profession: &str) -> Result<YearlyStats>
where
    P: AsRef<Path>,
    L: RateLookup + ?Sized,
{
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening partition {:?}", path))?;
    aggregate_reader(BufReader::new(file), rates, profession)
        .with_context(|| format!("aggregating partition {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::rates::RateTable;
    use crate::record::YearMonth;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn rec(name: &str, salary: Decimal, year: i32) -> VacancyRecord {
        VacancyRecord {
            name: name.to_string(),
            averaged_salary: salary,
            area_name: "Moscow".to_string(),
            published_at: format!("{year}-01-01T00:00:00+0300"),
            year,
        }
    }

    #[test]
    fn test_accumulator_average_floors() {
        let mut acc = YearAccumulator::default();
        assert_eq!(acc.average(), Some(0));
        acc.add(dec!(1500)).unwrap();
        acc.add(dec!(2000.9)).unwrap();
        assert_eq!(acc.count, 2);
        assert_eq!(acc.average(), Some(1750));
    }

    #[test]
    fn test_accumulator_rejects_overflow() {
        let mut acc = YearAccumulator::default();
        acc.add(Decimal::MAX).unwrap();
        assert_eq!(acc.add(Decimal::ONE), None);
        assert_eq!(acc.count, 1);
        assert_eq!(acc.salary_sum, Decimal::MAX);
    }

    #[test]
    fn test_huge_salary_bounds_are_an_error() {
        let header = "name,salary_from,salary_to,salary_currency,area_name,published_at\n";
        let huge = "50000000000000000000000000000";
        let csv = format!("{header}a,{huge},{huge},RUR,Moscow,2022-01-01T00:00:00+0300\n");
        let rates = RateTable::new("RUR");
        let err = aggregate_reader(Cursor::new(csv), &rates, "a").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::SalaryOverflow { .. })
        ));
    }

    #[test]
    fn test_year_sum_overflow_is_an_error() {
        let header = "name,salary_from,salary_to,salary_currency,area_name,published_at\n";
        let big = "30000000000000000000000000000";
        let mut csv = header.to_string();
        for _ in 0..10 {
            csv.push_str(&format!("a,{big},{big},RUR,Moscow,2022-01-01T00:00:00+0300\n"));
        }
        let rates = RateTable::new("RUR");
        let err = aggregate_reader(Cursor::new(csv), &rates, "a").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AggregateError>(),
            Some(AggregateError::SumOverflow { year: 2022 })
        ));
    }

    #[test]
    fn test_average_beyond_i64_is_an_error() {
        let records = vec![rec("a", dec!(100000000000000000000), 2021)];
        let err = aggregate(&records, "a").unwrap_err();
        assert!(matches!(
            err,
            AggregateError::AverageOutOfRange { year: 2021, .. }
        ));
    }

    #[test]
    fn test_worked_example() {
        let header = "name,salary_from,salary_to,salary_currency,area_name,published_at\n";
        let csv = format!(
            "{header}\
Engineer,1000,2000,RUR,Moscow,2022-01-01T00:00:00+0300\n\
Engineer,,4000,RUR,Moscow,2022-06-01T00:00:00+0300\n"
        );
        let rates = RateTable::new("RUR");
        let stats = aggregate_reader(Cursor::new(csv), &rates, "Engineer").unwrap();
        assert_eq!(stats.salary_by_year[&2022], 1750);
        assert_eq!(stats.count_by_year[&2022], 2);
        assert_eq!(stats.profession_salary_by_year[&2022], 1750);
    }

    #[test]
    fn test_unknown_currency_lowers_average() {
        let header = "name,salary_from,salary_to,salary_currency,area_name,published_at\n";
        let csv = format!(
            "{header}\
a,1000,1000,RUR,Moscow,2022-01-01T00:00:00+0300\n\
b,5000,5000,XYZ,Moscow,2022-02-01T00:00:00+0300\n"
        );
        let rates = RateTable::new("RUR");
        let stats = aggregate_reader(Cursor::new(csv), &rates, "zzz").unwrap();
        assert_eq!(stats.salary_by_year[&2022], 500);
        assert_eq!(stats.count_by_year[&2022], 2);
    }

    #[test]
    fn test_gap_fill() {
        let records = vec![
            rec("Senior Engineer", dec!(3000), 2022),
            rec("Analyst", dec!(1000), 2022),
            rec("Analyst", dec!(2000), 2023),
        ];
        let stats = aggregate(&records, "Engineer").unwrap();

        assert_eq!(stats.count_by_year, BTreeMap::from([(2022, 2), (2023, 1)]));
        assert_eq!(stats.salary_by_year, BTreeMap::from([(2022, 2000), (2023, 2000)]));
        assert_eq!(
            stats.profession_count_by_year,
            BTreeMap::from([(2022, 1), (2023, 0)])
        );
        assert_eq!(
            stats.profession_salary_by_year,
            BTreeMap::from([(2022, 3000), (2023, 0)])
        );
    }

    #[test]
    fn test_gap_fill_keeps_year_order() {
        let records = vec![
            rec("Analyst", dec!(1), 2019),
            rec("Engineer", dec!(1), 2020),
            rec("Analyst", dec!(1), 2021),
        ];
        let stats = aggregate(&records, "Engineer").unwrap();
        let years: Vec<i32> = stats.profession_count_by_year.keys().copied().collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
        assert_eq!(
            stats.years().collect::<Vec<_>>(),
            stats.profession_salary_by_year.keys().copied().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        let records = vec![rec("engineer", dec!(100), 2020)];
        let stats = aggregate(&records, "Engineer").unwrap();
        assert_eq!(stats.profession_count_by_year[&2020], 0);
    }

    #[test]
    fn test_empty_input() {
        let stats = aggregate(&[], "Engineer").unwrap();
        assert!(stats.is_empty());
        assert!(stats.profession_count_by_year.is_empty());
    }

    #[test]
    fn test_malformed_salary_aborts_partition() {
        let header = "name,salary_from,salary_to,salary_currency,area_name,published_at\n";
        let csv = format!("{header}a,ten,20,RUR,Moscow,2022-01-01T00:00:00+0300\n");
        let rates = RateTable::new("RUR");
        let err = aggregate_reader(Cursor::new(csv), &rates, "a").unwrap_err();
        assert!(format!("{:#}", err).contains("salary_from"));
    }

    #[test]
    fn test_converts_with_rate() {
        let header = "name,salary_from,salary_to,salary_currency,area_name,published_at\n";
        let csv = format!("{header}a,10,30,USD,Moscow,2022-01-01T00:00:00+0300\n");
        let mut rates = RateTable::new("RUR");
        rates.insert(YearMonth::new(2022, 1).unwrap(), "USD", dec!(70.25));
        let stats = aggregate_reader(Cursor::new(csv), &rates, "a").unwrap();
        // 20 * 70.25
        assert_eq!(stats.salary_by_year[&2022], 1405);
    }

    #[test]
    fn test_absorb_equals_union() {
        let a = aggregate(&[rec("Engineer", dec!(10), 2020)], "Engineer").unwrap();
        let b = aggregate(&[rec("Analyst", dec!(30), 2021)], "Engineer").unwrap();
        let mut merged = a.clone();
        merged.absorb(b.clone());

        let both = aggregate(
            &[rec("Engineer", dec!(10), 2020), rec("Analyst", dec!(30), 2021)],
            "Engineer",
        )
        .unwrap();
        assert_eq!(merged, both);
    }
}
