// src/record/mod.rs
pub mod date;
pub mod text;

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ParseError;
use crate::rates::RateLookup;

pub use date::YearMonth;
pub use text::clean_cell;

/// Fixed input schema, in file order.
pub const NAME: &str = "name";
pub const SALARY_FROM: &str = "salary_from";
pub const SALARY_TO: &str = "salary_to";
pub const SALARY_CURRENCY: &str = "salary_currency";
pub const AREA_NAME: &str = "area_name";
pub const PUBLISHED_AT: &str = "published_at";

pub const COLUMNS: [&str; 6] = [
    NAME,
    SALARY_FROM,
    SALARY_TO,
    SALARY_CURRENCY,
    AREA_NAME,
    PUBLISHED_AT,
];

/// Salary bounds exactly as published, before conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryRange {
    pub from: Option<Decimal>,
    pub to: Option<Decimal>,
    pub currency: String,
    pub published: YearMonth,
}

impl SalaryRange {
    /// Midpoint of the range in the base currency, rounded to 4 places.
    /// A missing bound counts as zero.
    pub fn averaged<R>(&self, rates: &R) -> Result<Decimal, ParseError>
    where
        R: RateLookup + ?Sized,
    {
        let from = self.from.unwrap_or(Decimal::ZERO);
        let to = self.to.unwrap_or(Decimal::ZERO);
        let rate = rates.rate(self.published, &self.currency);
        from.checked_add(to)
            .and_then(|sum| sum.checked_div(Decimal::TWO))
            .and_then(|mid| mid.checked_mul(rate))
            .map(|v| v.round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven))
            .ok_or_else(|| ParseError::SalaryOverflow {
                from: self.from,
                to: self.to,
                currency: self.currency.clone(),
                rate,
            })
    }
}

/// One valid vacancy with its salary already converted.
#[derive(Debug, Clone, PartialEq)]
pub struct VacancyRecord {
    pub name: String,
    pub averaged_salary: Decimal,
    pub area_name: String,
    pub published_at: String,
    pub year: i32,
}

/// Builds `VacancyRecord`s from rows keyed by header name.
pub struct RecordParser<'a, R: RateLookup + ?Sized> {
    rates: &'a R,
}

impl<'a, R: RateLookup + ?Sized> RecordParser<'a, R> {
    pub fn new(rates: &'a R) -> Self {
        Self { rates }
    }

    /// Parse a header/cell pair list. Cells are cleaned here, so raw partition
    /// rows and already-normalized rows both go through the same path.
    pub fn parse_row(
        &self,
        headers: &[String],
        cells: &[String],
    ) -> Result<VacancyRecord, ParseError> {
        let row: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(cells.iter().map(String::as_str))
            .collect();
        self.parse(&row)
    }

    pub fn parse(&self, row: &HashMap<&str, &str>) -> Result<VacancyRecord, ParseError> {
        let field = |name: &'static str| -> Result<String, ParseError> {
            row.get(name)
                .map(|v| clean_cell(v))
                .ok_or(ParseError::MissingColumn(name))
        };

        let published_at = field(PUBLISHED_AT)?;
        let published = YearMonth::from_published_at(&published_at)?;

        let salary = SalaryRange {
            from: parse_bound(SALARY_FROM, &field(SALARY_FROM)?)?,
            to: parse_bound(SALARY_TO, &field(SALARY_TO)?)?,
            currency: field(SALARY_CURRENCY)?,
            published,
        };

        Ok(VacancyRecord {
            name: field(NAME)?,
            averaged_salary: salary.averaged(self.rates)?,
            area_name: field(AREA_NAME)?,
            published_at,
            year: published.year,
        })
    }
}

/// Empty string is an absent bound; anything else must be a decimal.
/// Scientific notation (`1e5`) is accepted, as float-style exports produce it.
fn parse_bound(field: &'static str, value: &str) -> Result<Option<Decimal>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = if value.contains(['e', 'E']) {
        Decimal::from_scientific(value)
    } else {
        value.parse::<Decimal>()
    };
    parsed.map(Some).map_err(|source| ParseError::Salary {
        field,
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateTable;
    use rust_decimal_macros::dec;

    fn table() -> RateTable {
        let mut t = RateTable::new("RUR");
        t.insert(YearMonth::new(2022, 1).unwrap(), "USD", dec!(75.5));
        t
    }

    fn row<'a>(values: [&'a str; 6]) -> HashMap<&'a str, &'a str> {
        COLUMNS.iter().copied().zip(values).collect()
    }

    #[test]
    fn test_averages_and_converts() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let rec = parser
            .parse(&row([
                "Engineer",
                "1000",
                "2000",
                "USD",
                "Moscow",
                "2022-01-15T10:00:00+0300",
            ]))
            .unwrap();
        assert_eq!(rec.averaged_salary, dec!(113250.0000));
        assert_eq!(rec.year, 2022);
        assert_eq!(rec.published_at, "2022-01-15T10:00:00+0300");
    }

    #[test]
    fn test_base_currency_rate_is_one() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let rec = parser
            .parse(&row(["a", "", "4000", "RUR", "Perm", "2003-10-07T00:00:00+0400"]))
            .unwrap();
        assert_eq!(rec.averaged_salary, dec!(2000));
    }

    #[test]
    fn test_unknown_currency_is_zero() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let rec = parser
            .parse(&row(["a", "10", "20", "XYZ", "Perm", "2022-01-01T00:00:00+0300"]))
            .unwrap();
        assert_eq!(rec.averaged_salary, Decimal::ZERO);
    }

    #[test]
    fn test_rounds_to_four_places() {
        let mut rates = RateTable::new("RUR");
        rates.insert(YearMonth::new(2022, 3).unwrap(), "KZT", dec!(0.16789));
        let parser = RecordParser::new(&rates);
        let rec = parser
            .parse(&row(["a", "1", "2", "KZT", "Almaty", "2022-03-01T00:00:00+0600"]))
            .unwrap();
        // 1.5 * 0.16789 = 0.251835
        assert_eq!(rec.averaged_salary, dec!(0.2518));
    }

    #[test]
    fn test_text_fields_are_cleaned() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let rec = parser
            .parse(&row([
                "<b>Senior</b>   Engineer\n",
                "1e3",
                "",
                "RUR",
                "  Saint\nPetersburg ",
                "2022-01-01T00:00:00+0300",
            ]))
            .unwrap();
        assert_eq!(rec.name, "Senior Engineer;");
        assert_eq!(rec.area_name, "Saint; Petersburg");
        assert_eq!(rec.averaged_salary, dec!(500));
    }

    #[test]
    fn test_malformed_salary_is_fatal() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let err = parser
            .parse(&row(["a", "lots", "20", "RUR", "Perm", "2022-01-01T00:00:00+0300"]))
            .unwrap_err();
        assert!(matches!(err, ParseError::Salary { field: SALARY_FROM, .. }));
    }

    #[test]
    fn test_conversion_overflow_is_an_error() {
        let mut rates = RateTable::new("RUR");
        rates.insert(YearMonth::new(2022, 1).unwrap(), "USD", dec!(1000));
        let parser = RecordParser::new(&rates);
        let huge = "70000000000000000000000000000";
        let date = "2022-01-01T00:00:00+0300";

        // midpoint fits, conversion does not
        let err = parser
            .parse(&row(["a", huge, "", "USD", "Perm", date]))
            .unwrap_err();
        assert!(matches!(err, ParseError::SalaryOverflow { ref currency, .. } if currency == "USD"));

        let rec = parser.parse(&row(["a", huge, "", "RUR", "Perm", date])).unwrap();
        assert_eq!(rec.averaged_salary, dec!(35000000000000000000000000000));

        // the bounds alone already overflow when summed
        let err = parser
            .parse(&row(["a", huge, huge, "RUR", "Perm", date]))
            .unwrap_err();
        assert!(matches!(err, ParseError::SalaryOverflow { .. }));
    }

    #[test]
    fn test_missing_column() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let mut r = row(["a", "1", "2", "RUR", "Perm", "2022-01-01T00:00:00+0300"]);
        r.remove(AREA_NAME);
        assert!(matches!(
            parser.parse(&r),
            Err(ParseError::MissingColumn(AREA_NAME))
        ));
    }

    #[test]
    fn test_parse_row_by_header() {
        let rates = table();
        let parser = RecordParser::new(&rates);
        let headers: Vec<String> = COLUMNS.iter().map(|s| s.to_string()).collect();
        let cells: Vec<String> = ["x", "100", "300", "RUR", "Omsk", "2019-05-05T00:00:00+0300"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rec = parser.parse_row(&headers, &cells).unwrap();
        assert_eq!(rec.averaged_salary, dec!(200));
        assert_eq!(rec.year, 2019);
    }
}
