// src/split/mod.rs
use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read},
    path::{Path, PathBuf},
    time::Instant,
};

use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::{debug, info, instrument, warn};

use crate::error::SplitError;
use crate::record::{text::clean_row, YearMonth, PUBLISHED_AT, SALARY_FROM, SALARY_TO};

/// One per-year file written by the partitioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub year: i32,
    pub path: PathBuf,
    pub rows: u64,
}

/// What a split run saw and wrote.
#[derive(Debug, Clone, Default)]
pub struct SplitSummary {
    pub rows_read: u64,
    pub rows_dropped: u64,
    pub partitions: Vec<Partition>,
    /// Publication month of the first and last kept row.
    pub first_month: Option<YearMonth>,
    pub last_month: Option<YearMonth>,
}

impl SplitSummary {
    pub fn rows_kept(&self) -> u64 {
        self.partitions.iter().map(|p| p.rows).sum()
    }
}

/// The partition currently receiving rows.
struct OpenPartition {
    year: i32,
    path: PathBuf,
    writer: Writer<BufWriter<File>>,
    rows: u64,
}

/// Streams rows, already sorted by `published_at`, into one CSV per year.
///
/// Only the partition for the current year is open at any time; a row whose
/// year differs from the current one closes it and starts the next. A year
/// that shows up again after being closed means the input was not sorted.
pub struct YearPartitioner {
    out_dir: PathBuf,
    stem: String,
    ext: String,
    header: StringRecord,
    salary_from: usize,
    salary_to: usize,
    published_at: usize,
    current: Option<OpenPartition>,
    closed_years: HashSet<i32>,
    summary: SplitSummary,
}

impl YearPartitioner {
    /// Partitions are created under `out_dir` lazily, so it only has to exist
    /// by the time the first valid row arrives.
    pub fn new(
        header: StringRecord,
        out_dir: impl Into<PathBuf>,
        stem: impl Into<String>,
        ext: impl Into<String>,
    ) -> Result<Self, SplitError> {
        let index_of = |name: &'static str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(SplitError::MissingColumn(name))
        };
        let salary_from = index_of(SALARY_FROM)?;
        let salary_to = index_of(SALARY_TO)?;
        let published_at = index_of(PUBLISHED_AT)?;

        Ok(Self {
            out_dir: out_dir.into(),
            stem: stem.into(),
            ext: ext.into(),
            header,
            salary_from,
            salary_to,
            published_at,
            current: None,
            closed_years: HashSet::new(),
            summary: SplitSummary::default(),
        })
    }

    /// Row shape must match the header, and every cell must be filled unless
    /// exactly one of the two salary bounds is the empty one.
    pub fn is_valid_row(&self, row: &StringRecord) -> bool {
        if row.len() != self.header.len() {
            return false;
        }
        if row.iter().all(|cell| !cell.is_empty()) {
            return true;
        }
        let from_empty = row.get(self.salary_from).is_some_and(str::is_empty);
        let to_empty = row.get(self.salary_to).is_some_and(str::is_empty);
        from_empty != to_empty
    }

    /// Feed one raw data row. `line` is only used for error reporting.
    pub fn feed_row(&mut self, row: &StringRecord, line: u64) -> Result<(), SplitError> {
        self.summary.rows_read += 1;

        if !self.is_valid_row(row) {
            self.summary.rows_dropped += 1;
            return Ok(());
        }

        let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
        clean_row(&mut cells);

        let month = match YearMonth::from_published_at(&cells[self.published_at]) {
            Ok(m) => m,
            Err(e) => {
                debug!(line, error = %e, "dropping row with unreadable published_at");
                self.summary.rows_dropped += 1;
                return Ok(());
            }
        };

        if self.current.as_ref().map(|p| p.year) != Some(month.year) {
            self.flush_current()?;
            if self.closed_years.contains(&month.year) {
                return Err(SplitError::Unsorted {
                    year: month.year,
                    line,
                });
            }
            self.current = Some(self.open_partition(month.year)?);
        }

        if let Some(part) = self.current.as_mut() {
            part.writer.write_record(&cells)?;
            part.rows += 1;
        }

        self.summary.first_month.get_or_insert(month);
        self.summary.last_month = Some(month);
        Ok(())
    }

    fn open_partition(&self, year: i32) -> Result<OpenPartition, SplitError> {
        let path = self
            .out_dir
            .join(format!("{}_{}.{}", self.stem, year, self.ext));
        let file = File::create(&path)?;
        let mut writer = Writer::from_writer(BufWriter::new(file));
        writer.write_record(&self.header)?;
        debug!(year, path = %path.display(), "opened partition");
        Ok(OpenPartition {
            year,
            path,
            writer,
            rows: 0,
        })
    }

    /// Close the open partition, if any, and record it in the summary.
    fn flush_current(&mut self) -> Result<(), SplitError> {
        if let Some(mut part) = self.current.take() {
            part.writer.flush()?;
            debug!(year = part.year, rows = part.rows, "closed partition");
            self.closed_years.insert(part.year);
            self.summary.partitions.push(Partition {
                year: part.year,
                path: part.path,
                rows: part.rows,
            });
        }
        Ok(())
    }

    /// Call once the input is exhausted.
    pub fn flush_final(mut self) -> Result<SplitSummary, SplitError> {
        self.flush_current()?;
        Ok(self.summary)
    }
}

/// Split a sorted vacancy CSV read from `reader` into `<stem>_<year>.<ext>`
/// files under `out_dir`, which must not exist yet.
pub fn split_reader<R: Read>(
    reader: R,
    out_dir: &Path,
    stem: &str,
    ext: &str,
) -> Result<SplitSummary, SplitError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.records();
    let header = match records.next() {
        Some(h) => strip_bom(h?),
        None => return Err(SplitError::MissingHeader),
    };

    let mut partitioner = YearPartitioner::new(header, out_dir, stem, ext)?;
    create_fresh_dir(out_dir)?;

    for result in records {
        let row = result?;
        let line = row.position().map_or(0, |p| p.line());
        partitioner.feed_row(&row, line)?;
    }

    partitioner.flush_final()
}

#[instrument(level = "info", skip(input, out_dir), fields(input = %input.as_ref().display()))]
pub fn split_csv_by_year<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    out_dir: Q,
) -> Result<SplitSummary, SplitError> {
    let start = Instant::now();
    let input = input.as_ref();
    let out_dir = out_dir.as_ref();

    // fail on an existing output dir before touching the input
    if out_dir.exists() {
        return Err(SplitError::OutputExists(out_dir.to_path_buf()));
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("vacancies");
    let ext = input
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("csv");

    let file = File::open(input)?;
    let summary = split_reader(BufReader::new(file), out_dir, stem, ext)?;

    if summary.partitions.is_empty() {
        warn!("no valid rows; no partitions written");
    }
    info!(
        rows_read = summary.rows_read,
        rows_kept = summary.rows_kept(),
        rows_dropped = summary.rows_dropped,
        partitions = summary.partitions.len(),
        elapsed = ?start.elapsed(),
        "split complete"
    );
    Ok(summary)
}

fn create_fresh_dir(dir: &Path) -> Result<(), SplitError> {
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir(dir).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => SplitError::OutputExists(dir.to_path_buf()),
        _ => SplitError::Io(e),
    })
}

fn strip_bom(header: StringRecord) -> StringRecord {
    if !header.get(0).is_some_and(|h| h.starts_with('\u{feff}')) {
        return header;
    }
    header
        .iter()
        .enumerate()
        .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}') } else { h })
        .collect()
}
