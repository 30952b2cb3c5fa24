// src/report/mod.rs
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use csv::Writer;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::YearlyStats;

/// Statistics ready to be handed to whatever renders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyReport {
    pub profession: String,
    #[serde(flatten)]
    pub stats: YearlyStats,
}

/// One row of the year table, in the column order the renderers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRow {
    pub year: i32,
    pub average_salary: i64,
    pub profession_average_salary: i64,
    pub vacancies: u64,
    pub profession_vacancies: u64,
}

impl YearlyReport {
    pub fn new(profession: impl Into<String>, stats: YearlyStats) -> Self {
        Self {
            profession: profession.into(),
            stats,
        }
    }

    /// Rows in ascending year order. Profession columns read 0 for a year
    /// the filtered mappings lack.
    pub fn rows(&self) -> Vec<YearRow> {
        let s = &self.stats;
        s.years()
            .map(|year| YearRow {
                year,
                average_salary: s.salary_by_year.get(&year).copied().unwrap_or(0),
                profession_average_salary: s
                    .profession_salary_by_year
                    .get(&year)
                    .copied()
                    .unwrap_or(0),
                vacancies: s.count_by_year.get(&year).copied().unwrap_or(0),
                profession_vacancies: s
                    .profession_count_by_year
                    .get(&year)
                    .copied()
                    .unwrap_or(0),
            })
            .collect()
    }
}

/// Something that consumes the finished statistics: a table, a chart, a PDF.
pub trait ReportSink {
    fn render(&self, report: &YearlyReport) -> Result<()>;
}

/// Logs the four mappings.
pub struct ConsoleSummary;

impl ReportSink for ConsoleSummary {
    fn render(&self, report: &YearlyReport) -> Result<()> {
        let s = &report.stats;
        if s.is_empty() {
            warn!("no vacancies to report");
            return Ok(());
        }
        info!("salary by year: {:?}", s.salary_by_year);
        info!("vacancies by year: {:?}", s.count_by_year);
        info!(
            "salary by year for `{}`: {:?}",
            report.profession, s.profession_salary_by_year
        );
        info!(
            "vacancies by year for `{}`: {:?}",
            report.profession, s.profession_count_by_year
        );
        Ok(())
    }
}

/// Writes the year table as CSV. Refuses to overwrite an existing file.
pub struct CsvTable {
    pub path: PathBuf,
}

impl ReportSink for CsvTable {
    fn render(&self, report: &YearlyReport) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .with_context(|| format!("creating {:?}", self.path))?;
        let mut w = Writer::from_writer(BufWriter::new(file));
        w.write_record([
            "year".to_string(),
            "average_salary".to_string(),
            format!("average_salary - {}", report.profession),
            "vacancies".to_string(),
            format!("vacancies - {}", report.profession),
        ])?;
        for row in report.rows() {
            w.write_record([
                row.year.to_string(),
                row.average_salary.to_string(),
                row.profession_average_salary.to_string(),
                row.vacancies.to_string(),
                row.profession_vacancies.to_string(),
            ])?;
        }
        w.flush()?;
        info!(path = %self.path.display(), "wrote year table");
        Ok(())
    }
}

/// Writes the report as pretty JSON.
pub struct JsonSummary {
    pub path: PathBuf,
}

impl ReportSink for JsonSummary {
    fn render(&self, report: &YearlyReport) -> Result<()> {
        let file =
            File::create(&self.path).with_context(|| format!("creating {:?}", self.path))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, report).context("serializing report")?;
        w.write_all(b"\n")?;
        w.flush()?;
        info!(path = %self.path.display(), "wrote JSON summary");
        Ok(())
    }
}
