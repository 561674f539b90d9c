//! Persistence for transformation ledgers and run metrics.

use super::stages::PipelineMetrics;
use crate::error::{Result, ResultExt as _};
use crate::io::file_stem;
use crate::refiner::TransformationLedger;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a run writes its audit artifacts.
///
/// Both artifacts are keyed by dataset name, so runs over different datasets
/// never write the same file.
pub trait ArtifactStore: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the ledger cannot be written.
    fn save_ledger(&self, dataset: &str, ledger: &TransformationLedger) -> Result<PathBuf>;

    /// # Errors
    ///
    /// Returns error if the metrics cannot be written.
    fn save_metrics(&self, metrics: &PipelineMetrics) -> Result<PathBuf>;
}

/// Pretty-printed JSON files under one directory.
#[derive(Debug, Clone)]
pub struct JsonArtifactStore {
    base_path: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn ledger_path(&self, dataset: &str) -> PathBuf {
        self.base_path
            .join(format!("transformation_log_{}.json", file_stem(dataset)))
    }

    pub fn metrics_path(&self, dataset: &str) -> PathBuf {
        self.base_path
            .join(format!("pipeline_metrics_{}.json", file_stem(dataset)))
    }

    fn write_json(&self, path: PathBuf, value: &impl Serialize) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_path).with_context(|| {
            format!("Failed to create artifact directory {}", self.base_path.display())
        })?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Artifact written: {}", path.display());
        Ok(path)
    }
}

impl ArtifactStore for JsonArtifactStore {
    fn save_ledger(&self, dataset: &str, ledger: &TransformationLedger) -> Result<PathBuf> {
        self.write_json(self.ledger_path(dataset), ledger)
    }

    fn save_metrics(&self, metrics: &PipelineMetrics) -> Result<PathBuf> {
        self.write_json(self.metrics_path(&metrics.dataset), metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refiner::TransformationRecord;
    use polars::prelude::*;

    #[test]
    fn test_writes_both_artifacts() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = JsonArtifactStore::new(tmp.path().join("artifacts"));

        let df = df!("a" => &[1])?;
        let mut ledger = TransformationLedger::new();
        ledger.append(TransformationRecord::new("remove_duplicates", &df, &df)?);
        let ledger_path = store.save_ledger("sales", &ledger)?;
        assert!(ledger_path.ends_with("transformation_log_sales.json"));
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&ledger_path)?)?;
        assert_eq!(written[0]["operation"], "remove_duplicates");

        let metrics_path = store.save_metrics(&PipelineMetrics::new("sales"))?;
        assert!(metrics_path.ends_with("pipeline_metrics_sales.json"));
        assert!(metrics_path.is_file());
        Ok(())
    }

    #[test]
    fn test_dataset_names_stay_inside_the_store() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = JsonArtifactStore::new(tmp.path());

        let path = store.save_metrics(&PipelineMetrics::new("eu/sales"))?;
        assert_eq!(path, tmp.path().join("pipeline_metrics_eu_sales.json"));
        assert!(path.is_file());

        let ledger = TransformationLedger::new();
        let first = store.save_ledger("orders", &ledger)?;
        let second = store.save_ledger("returns", &ledger)?;
        assert_ne!(first, second);
        assert!(first.is_file() && second.is_file());
        Ok(())
    }
}
