// src/pipeline/mod.rs
use std::{fs, time::Instant};

use anyhow::{bail, Context, Result};
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::reduce::{discover_partitions, reduce_partitions};
use crate::report::{ConsoleSummary, CsvTable, JsonSummary, ReportSink, YearlyReport};
use crate::split::split_csv_by_year;

/// Split → reduce. Returns the merged statistics without rendering them.
#[instrument(level = "info", skip(cfg), fields(input = %cfg.input.display()))]
pub fn build_report(cfg: &PipelineConfig) -> Result<YearlyReport> {
    let start = Instant::now();
    let rates = cfg.load_rates()?;

    let partitions = if cfg.skip_split {
        discover_partitions(&cfg.partitions_dir)?
    } else {
        if cfg.clean && cfg.partitions_dir.exists() {
            fs::remove_dir_all(&cfg.partitions_dir)
                .with_context(|| format!("removing {:?}", cfg.partitions_dir))?;
            info!(dir = %cfg.partitions_dir.display(), "removed old partitions");
        }
        let summary = split_csv_by_year(&cfg.input, &cfg.partitions_dir)
            .with_context(|| format!("splitting {:?}", cfg.input))?;
        if let (Some(first), Some(last)) = (summary.first_month, summary.last_month) {
            info!(%first, %last, "publication range");
        }
        summary.partitions.into_iter().map(|p| p.path).collect()
    };

    if partitions.is_empty() {
        bail!("no partitions to aggregate in {:?}", cfg.partitions_dir);
    }

    let stats = reduce_partitions(&partitions, &rates, &cfg.profession, cfg.workers)?;
    info!(elapsed = ?start.elapsed(), years = stats.count_by_year.len(), "statistics ready");
    Ok(YearlyReport::new(cfg.profession.clone(), stats))
}

/// The sinks a config asks for. The console summary is always included.
pub fn sinks(cfg: &PipelineConfig) -> Vec<Box<dyn ReportSink>> {
    let mut out: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleSummary)];
    if let Some(path) = &cfg.table_out {
        out.push(Box::new(CsvTable { path: path.clone() }));
    }
    if let Some(path) = &cfg.json_out {
        out.push(Box::new(JsonSummary { path: path.clone() }));
    }
    out
}

pub fn run(cfg: &PipelineConfig) -> Result<YearlyReport> {
    let report = build_report(cfg)?;
    for sink in sinks(cfg) {
        sink.render(&report)?;
    }
    Ok(report)
}
