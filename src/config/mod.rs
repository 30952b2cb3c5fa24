// src/config/mod.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::rates::{RateTable, DEFAULT_BASE_CURRENCY};

/// Everything one pipeline run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub partitions_dir: PathBuf,
    /// Cached month × currency table. Without one only the base currency
    /// converts; everything else contributes a zero salary.
    pub rates: Option<PathBuf>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    pub profession: String,
    #[serde(default = "num_cpus::get")]
    pub workers: usize,
    /// Remove `partitions_dir` before splitting.
    #[serde(default)]
    pub clean: bool,
    /// Reuse partitions already in `partitions_dir` instead of splitting.
    #[serde(default)]
    pub skip_split: bool,
    pub table_out: Option<PathBuf>,
    pub json_out: Option<PathBuf>,
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

impl PipelineConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        partitions_dir: impl Into<PathBuf>,
        profession: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            partitions_dir: partitions_dir.into(),
            rates: None,
            base_currency: default_base_currency(),
            profession: profession.into(),
            workers: num_cpus::get(),
            clean: false,
            skip_split: false,
            table_out: None,
            json_out: None,
        }
    }

    pub fn load_rates(&self) -> Result<RateTable> {
        match &self.rates {
            Some(path) => RateTable::from_csv_path(&self.base_currency, path)
                .with_context(|| format!("loading rate cache {:?}", path)),
            None => {
                warn!(
                    base = %self.base_currency,
                    "no rate cache configured; non-base currencies will count as zero"
                );
                Ok(RateTable::new(self.base_currency.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateLookup;
    use crate::record::YearMonth;
    use rust_decimal::Decimal;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_from_json() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"input":"v.csv","partitions_dir":"by_year","rates":null,"profession":"Engineer","table_out":null,"json_out":null}"#,
        )
        .unwrap();
        assert_eq!(cfg.base_currency, "RUR");
        assert!(cfg.workers >= 1);
        assert!(!cfg.clean);
    }

    #[test]
    fn test_load_rates() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("rates.csv");
        fs::write(&path, "date,USD\n01/2020,61.9\n").unwrap();

        let mut cfg = PipelineConfig::new("v.csv", "out", "x");
        let empty = cfg.load_rates().unwrap();
        assert_eq!(empty.months(), 0);

        cfg.rates = Some(path);
        let ym = YearMonth::new(2020, 1).unwrap();
        assert_eq!(cfg.load_rates().unwrap().rate(ym, "USD"), "61.9".parse::<Decimal>().unwrap());

        cfg.rates = Some(tmp.path().join("missing.csv"));
        assert!(cfg.load_rates().is_err());
    }
}
