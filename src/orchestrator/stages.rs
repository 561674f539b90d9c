//! Per-stage records and whole-run metrics.

use crate::refiner::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Load,
    Inspect,
    Refine,
    Insight,
    Save,
}

impl StageName {
    pub const ORDER: [Self; 5] = [
        Self::Load,
        Self::Inspect,
        Self::Refine,
        Self::Insight,
        Self::Save,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Inspect => "inspect",
            Self::Refine => "refine",
            Self::Insight => "insight",
            Self::Save => "save",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failed,
    Skipped,
}

/// Wall-clock and monotonic start of a stage.
#[derive(Debug, Clone, Copy)]
pub struct StageStart {
    at: DateTime<Utc>,
    instant: Instant,
}

impl StageStart {
    pub fn now() -> Self {
        Self {
            at: Utc::now(),
            instant: Instant::now(),
        }
    }
}

/// Outcome of one stage. The status is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    stage: StageName,
    status: StageStatus,
    start_time: DateTime<Utc>,
    duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StageRecord {
    pub fn success(stage: StageName, start: StageStart, results: Value) -> Self {
        Self {
            stage,
            status: StageStatus::Success,
            start_time: start.at,
            duration_seconds: start.instant.elapsed().as_secs_f64(),
            results: Some(results),
            error: None,
        }
    }

    pub fn failed(stage: StageName, start: StageStart, error: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            start_time: start.at,
            duration_seconds: start.instant.elapsed().as_secs_f64(),
            results: None,
            error: Some(error.into()),
        }
    }

    pub fn skipped(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            start_time: Utc::now(),
            duration_seconds: 0.0,
            results: None,
            error: None,
        }
    }

    pub fn stage(&self) -> StageName {
        self.stage
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn results(&self) -> Option<&Value> {
        self.results.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Metrics for one orchestrator run; persisted whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub run_id: Uuid,
    pub dataset: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub stages: Vec<StageRecord>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    started: Option<Instant>,
}

impl PipelineMetrics {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dataset: dataset.into(),
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: 0.0,
            stages: Vec::new(),
            // a run only counts as successful once `finish` says so
            status: RunStatus::Failed,
            error: None,
            started: Some(Instant::now()),
        }
    }

    pub fn record(&mut self, record: StageRecord) {
        tracing::debug!(
            stage = record.stage().as_str(),
            status = ?record.status(),
            "Stage recorded in {:.3}s",
            record.duration_seconds()
        );
        self.stages.push(record);
    }

    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        self.end_time = Some(Utc::now());
        self.duration_seconds = self
            .started
            .map_or(0.0, |started| started.elapsed().as_secs_f64());
        self.status = status;
        self.error = error;
    }

    pub fn stage(&self, name: StageName) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage() == name)
    }

    /// `{total_duration, status, stages: {name: {status, duration}}}`.
    pub fn summary(&self) -> Value {
        let stages: Map<String, Value> = self
            .stages
            .iter()
            .map(|r| {
                (
                    r.stage().as_str().to_owned(),
                    json!({"status": r.status(), "duration": r.duration_seconds()}),
                )
            })
            .collect();
        json!({
            "total_duration": self.duration_seconds,
            "status": self.status,
            "stages": stages,
        })
    }
}
