//! End-to-end runs: load, inspect, refine, insight, save.
//!
//! Stages run strictly in that order. `load` always runs; every other stage is
//! gated by its enabled flag and records `skipped` when off. The first stage
//! error records a `failed` stage, ends the run and leaves no records for the
//! stages after it. Metrics are persisted through the [`ArtifactStore`] on
//! every outcome.

pub mod collaborators;
pub mod stages;
pub mod store;

pub use collaborators::{Insight, Inspector, ProfileInspector, Refiner, SummaryInsight};
pub use stages::{PipelineMetrics, StageName, StageRecord, StageStart, StageStatus};
pub use store::{ArtifactStore, JsonArtifactStore};

use crate::config::PipelineConfig;
use crate::io::{load_frame, save_frame};
use crate::refiner::{RefinementPipeline, RunStatus};
use anyhow::{Context as _, Result, anyhow};
use polars::prelude::DataFrame;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Dataset handed to [`StageOrchestrator::run`].
#[derive(Debug, Clone)]
pub enum PipelineInput {
    Path(PathBuf),
    Frame(DataFrame),
}

impl From<PathBuf> for PipelineInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for PipelineInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<DataFrame> for PipelineInput {
    fn from(df: DataFrame) -> Self {
        Self::Frame(df)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub status: RunStatus,
    pub metrics: PipelineMetrics,
    pub error: Option<String>,
    /// Final dataset; present only when the run succeeded.
    pub data: Option<DataFrame>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

pub struct StageOrchestrator {
    config: PipelineConfig,
    inspector: Box<dyn Inspector>,
    refiner: Box<dyn Refiner>,
    insight: Box<dyn Insight>,
    store: Box<dyn ArtifactStore>,
}

impl std::fmt::Debug for StageOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StageOrchestrator {
    /// Orchestrator with the built-in collaborators and a JSON store at
    /// `config.artifacts_path`.
    pub fn new(config: PipelineConfig) -> Self {
        let refiner = RefinementPipeline::new(config.refiner().clone());
        let store = JsonArtifactStore::new(config.artifacts_path.clone());
        Self {
            config,
            inspector: Box::new(ProfileInspector),
            refiner: Box::new(refiner),
            insight: Box::new(SummaryInsight::default()),
            store: Box::new(store),
        }
    }

    #[must_use]
    pub fn with_inspector(mut self, inspector: impl Inspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    #[must_use]
    pub fn with_refiner(mut self, refiner: impl Refiner + 'static) -> Self {
        self.refiner = Box::new(refiner);
        self
    }

    #[must_use]
    pub fn with_insight(mut self, insight: impl Insight + 'static) -> Self {
        self.insight = Box::new(insight);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: impl ArtifactStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage against `input`.
    ///
    /// Stage errors never escape: they are captured in the outcome and in the
    /// persisted metrics. A failure to persist the metrics is only logged.
    pub fn run(
        &self,
        input: impl Into<PipelineInput>,
        output: Option<&Path>,
        dataset_name: &str,
    ) -> PipelineOutcome {
        tracing::info!("Pipeline run started for dataset '{dataset_name}'");
        let mut metrics = PipelineMetrics::new(dataset_name);

        let (status, error, data) =
            match self.execute(input.into(), output, dataset_name, &mut metrics) {
                Ok(df) => (RunStatus::Success, None, Some(df)),
                Err(e) => {
                    tracing::error!("Pipeline run failed: {e:#}");
                    (RunStatus::Failed, Some(format!("{e:#}")), None)
                }
            };
        metrics.finish(status, error.clone());

        match self.store.save_metrics(&metrics) {
            Ok(path) => tracing::info!("Pipeline metrics saved to {}", path.display()),
            Err(e) => tracing::warn!("Failed to persist pipeline metrics: {e}"),
        }
        tracing::info!(
            "Pipeline run {} in {:.2}s",
            status.as_str(),
            metrics.duration_seconds
        );

        PipelineOutcome {
            status,
            metrics,
            error,
            data,
        }
    }

    fn execute(
        &self,
        input: PipelineInput,
        output: Option<&Path>,
        dataset_name: &str,
        metrics: &mut PipelineMetrics,
    ) -> Result<DataFrame> {
        let stages = &self.config.pipeline;

        let mut df = run_stage(metrics, StageName::Load, || {
            let df = match input {
                PipelineInput::Path(path) => load_frame(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                PipelineInput::Frame(df) => df,
            };
            let results = json!({"rows": df.height(), "columns": df.width()});
            Ok((df, results))
        })?;

        if stages.inspector.enabled {
            run_stage(metrics, StageName::Inspect, || {
                Ok(((), self.inspector.inspect(&df)?))
            })?;
        } else {
            metrics.record(StageRecord::skipped(StageName::Inspect));
        }

        if stages.refiner.enabled {
            df = run_stage(metrics, StageName::Refine, || self.refine(&df, dataset_name))?;
        } else {
            metrics.record(StageRecord::skipped(StageName::Refine));
        }

        if stages.insight.enabled {
            run_stage(metrics, StageName::Insight, || {
                Ok(((), self.insight.analyze(&df)?))
            })?;
        } else {
            metrics.record(StageRecord::skipped(StageName::Insight));
        }

        if stages.save.enabled {
            let path = output.map_or_else(
                || self.config.default_output_path(dataset_name),
                Path::to_path_buf,
            );
            run_stage(metrics, StageName::Save, || {
                save_frame(&df, &path)?;
                Ok(((), json!({"output_path": path.display().to_string()})))
            })?;
        } else {
            metrics.record(StageRecord::skipped(StageName::Save));
        }

        Ok(df)
    }

    /// Refine, persist the ledger, then fail the stage if any operation failed.
    fn refine(&self, df: &DataFrame, dataset_name: &str) -> Result<(DataFrame, Value)> {
        let (refined, report) = self.refiner.refine(df)?;
        let ledger_path = self
            .store
            .save_ledger(dataset_name, &report.transformation_log)
            .context("Failed to persist transformation log")?;
        if !report.is_success() {
            return Err(anyhow!(
                "Refinement failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            ));
        }
        let results = json!({
            "operations_performed": report.operations_performed,
            "rows_before": report.rows_before,
            "rows_after": report.rows_after,
            "columns_before": report.columns_before,
            "columns_after": report.columns_after,
            "transformations": report.transformation_log.len(),
            "transformation_log_path": ledger_path.display().to_string(),
        });
        Ok((refined, results))
    }
}

/// Time `body`, record its outcome and pass its value or error through.
fn run_stage<T>(
    metrics: &mut PipelineMetrics,
    stage: StageName,
    body: impl FnOnce() -> Result<(T, Value)>,
) -> Result<T> {
    tracing::info!("Stage '{stage}' started");
    let start = StageStart::now();
    match body() {
        Ok((value, results)) => {
            metrics.record(StageRecord::success(stage, start, results));
            tracing::info!("Stage '{stage}' completed");
            Ok(value)
        }
        Err(e) => {
            tracing::error!("Stage '{stage}' failed: {e:#}");
            metrics.record(StageRecord::failed(stage, start, format!("{e:#}")));
            Err(e.context(format!("{stage} stage failed")))
        }
    }
}
