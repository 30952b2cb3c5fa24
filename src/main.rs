use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vacstats::{config::PipelineConfig, pipeline};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Split a vacancy CSV by year and report salary and vacancy dynamics"
)]
struct Args {
    /// Vacancy CSV, sorted by published_at.
    #[arg(short, long, env = "VACSTATS_INPUT")]
    input: PathBuf,
    /// Substring a vacancy name must contain to count towards the profession.
    #[arg(short, long, env = "VACSTATS_PROFESSION")]
    profession: String,
    #[arg(long, env = "VACSTATS_PARTITIONS", default_value = "vacancies_by_year")]
    partitions: PathBuf,
    /// Month × currency rate cache (`date,USD,EUR,...`).
    #[arg(long, env = "VACSTATS_RATES")]
    rates: Option<PathBuf>,
    #[arg(long, env = "VACSTATS_BASE_CURRENCY", default_value = "RUR")]
    base_currency: String,
    /// Defaults to the number of logical CPUs.
    #[arg(short, long, env = "VACSTATS_WORKERS")]
    workers: Option<usize>,
    /// Delete an existing partitions directory first.
    #[arg(long)]
    clean: bool,
    /// Aggregate partitions already on disk.
    #[arg(long, conflicts_with = "clean")]
    skip_split: bool,
    #[arg(long, env = "VACSTATS_TABLE_OUT", default_value = "report.csv")]
    table_out: PathBuf,
    #[arg(long, env = "VACSTATS_JSON_OUT")]
    json_out: Option<PathBuf>,
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        let mut cfg = PipelineConfig::new(args.input, args.partitions, args.profession);
        cfg.rates = args.rates;
        cfg.base_currency = args.base_currency;
        if let Some(w) = args.workers {
            cfg.workers = w;
        }
        cfg.clean = args.clean;
        cfg.skip_split = args.skip_split;
        cfg.table_out = Some(args.table_out);
        cfg.json_out = args.json_out;
        cfg
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configure ────────────────────────────────────────────────
    let cfg: PipelineConfig = Args::parse().into();
    info!(
        input = %cfg.input.display(),
        profession = %cfg.profession,
        workers = cfg.workers,
        "startup"
    );

    // ─── 3) split, reduce, render ────────────────────────────────────
    let report = pipeline::run(&cfg)?;

    info!(years = report.stats.count_by_year.len(), "all done");
    Ok(())
}
