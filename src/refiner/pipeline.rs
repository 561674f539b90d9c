//! Ordered execution of named refinement operations.
//!
//! [`RefinementPipeline::run`] threads a fresh [`TransformationLedger`] through
//! every recognized operation and hands it back inside the [`RefineReport`].
//! Unknown operation names are skipped with a debug log; a name listed twice
//! runs once. An error stops the remaining operations and the frame refined
//! so far is returned alongside a `failed` report.

use super::categories::{CategoryUnifier, DEFAULT_SIMILARITY_THRESHOLD};
use super::columns::{NormalizeMethod, clean_column_names, normalize_numeric_columns};
use super::duplicates::DuplicateRowEliminator;
use super::ledger::{TransformationLedger, TransformationRecord};
use super::missing::{MissingValueResolver, MissingValueSettings};
use super::values::columns_of_kind;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CleanColumnNames,
    HandleMissingValues,
    RemoveDuplicates,
    Normalize,
    UnifyCategories,
}

impl Operation {
    pub const ALL: [Self; 5] = [
        Self::CleanColumnNames,
        Self::HandleMissingValues,
        Self::RemoveDuplicates,
        Self::Normalize,
        Self::UnifyCategories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CleanColumnNames => "clean_column_names",
            Self::HandleMissingValues => "handle_missing_values",
            Self::RemoveDuplicates => "remove_duplicates",
            Self::Normalize => "normalize",
            Self::UnifyCategories => "unify_categories",
        }
    }

    /// `None` for names the pipeline does not recognize.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name.trim())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_operations() -> Vec<String> {
    [
        Operation::CleanColumnNames,
        Operation::HandleMissingValues,
        Operation::RemoveDuplicates,
    ]
    .iter()
    .map(|op| op.as_str().to_owned())
    .collect()
}

/// Parameters for every refinement operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    pub enabled: bool,
    pub operations: Vec<String>,
    pub missing: MissingValueSettings,
    pub duplicate_subset: Option<Vec<String>>,
    pub similarity_threshold: f64,
    /// Columns to unify; every text column when unset.
    pub unify_columns: Option<Vec<String>>,
    /// `standard`, `minmax` or `robust`.
    pub normalize_method: String,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            operations: default_operations(),
            missing: MissingValueSettings::default(),
            duplicate_subset: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            unify_columns: None,
            normalize_method: NormalizeMethod::default().as_str().to_owned(),
        }
    }
}

impl RefinerConfig {
    /// # Errors
    ///
    /// Returns [`RefineError::InvalidStrategy`](crate::error::RefineError::InvalidStrategy)
    /// if `normalize_method` does not parse.
    pub fn normalization(&self) -> Result<NormalizeMethod> {
        self.normalize_method.parse()
    }

    /// Resolve every strategy name.
    ///
    /// # Errors
    ///
    /// Returns [`RefineError::InvalidStrategy`](crate::error::RefineError::InvalidStrategy)
    /// for the first name that does not parse.
    pub fn check_strategies(&self) -> Result<()> {
        self.missing.parse()?;
        self.normalization()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one [`RefinementPipeline::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RefineReport {
    pub operations_performed: Vec<Operation>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub transformation_log: TransformationLedger,
}

impl RefineReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn summary(&self) -> String {
        format!(
            "Refinement {}: {} operations, rows {} → {}, columns {} → {}",
            self.status.as_str(),
            self.operations_performed.len(),
            self.rows_before,
            self.rows_after,
            self.columns_before,
            self.columns_after,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefinementPipeline {
    config: RefinerConfig,
}

impl RefinementPipeline {
    pub fn new(config: RefinerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// Run the operations listed in the config.
    pub fn run_configured(&self, df: &DataFrame) -> (DataFrame, RefineReport) {
        self.run(df, self.config.operations.as_slice())
    }

    pub fn run<S: AsRef<str>>(&self, df: &DataFrame, operations: &[S]) -> (DataFrame, RefineReport) {
        tracing::info!("Starting refinement with {} requested operations", operations.len());

        let mut ledger = TransformationLedger::new();
        let mut performed: Vec<Operation> = Vec::new();
        let mut seen: HashSet<Operation> = HashSet::new();
        let mut current = df.clone();
        let mut failure = None;

        for name in operations {
            let name = name.as_ref();
            let Some(op) = Operation::parse(name) else {
                tracing::debug!("Ignoring unknown operation: {name}");
                continue;
            };
            if !seen.insert(op) {
                tracing::debug!("Operation {op} already ran; skipping repeat");
                continue;
            }
            match self.apply(op, &current, &mut ledger) {
                Ok(next) => {
                    current = next;
                    performed.push(op);
                }
                Err(e) => {
                    tracing::error!("Refinement operation {op} failed: {e}");
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        let report = RefineReport {
            operations_performed: performed,
            rows_before: df.height(),
            rows_after: current.height(),
            columns_before: df.width(),
            columns_after: current.width(),
            status: if failure.is_some() {
                RunStatus::Failed
            } else {
                RunStatus::Success
            },
            error: failure,
            transformation_log: ledger,
        };
        tracing::info!("{}", report.summary());
        (current, report)
    }

    fn apply(&self, op: Operation, df: &DataFrame, ledger: &mut TransformationLedger) -> Result<DataFrame> {
        match op {
            Operation::CleanColumnNames => clean_column_names(df, ledger),
            Operation::HandleMissingValues => {
                MissingValueResolver::new(self.config.missing.parse()?).resolve(df, ledger)
            }
            Operation::RemoveDuplicates => {
                DuplicateRowEliminator::new(self.config.duplicate_subset.clone()).eliminate(df, ledger)
            }
            Operation::Normalize => normalize_numeric_columns(df, self.config.normalization()?, ledger),
            Operation::UnifyCategories => self.unify_categories(df, ledger),
        }
    }

    /// Unify every configured (or every text) column under one aggregate record.
    fn unify_categories(&self, df: &DataFrame, ledger: &mut TransformationLedger) -> Result<DataFrame> {
        let threshold = self.config.similarity_threshold;
        let targets = self
            .config
            .unify_columns
            .clone()
            .unwrap_or_else(|| columns_of_kind(df, |kind| kind.is_textual()));
        let unifier = CategoryUnifier::new(threshold);

        let mut out = df.clone();
        let mut unified_count = 0;
        let mut per_column = Map::new();
        let mut skipped = Vec::new();
        for column in &targets {
            match unifier.unify_column(&out, column) {
                Ok(unification) => {
                    unified_count += unification.unified_count();
                    per_column.insert(column.clone(), Value::from(unification.unified_count()));
                    out = unification.frame;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping unification: {e}");
                    skipped.push(column.clone());
                }
                Err(e) => return Err(e),
            }
        }

        ledger.append(
            TransformationRecord::new("unify_categories", df, &out)?
                .with("columns", targets)
                .with("unified_count", unified_count)
                .with("per_column", Value::Object(per_column))
                .with("skipped_columns", skipped)
                .with("threshold", threshold),
        );
        Ok(out)
    }
}
