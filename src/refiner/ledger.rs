//! Append-only provenance log for one refinement run.
//!
//! Every operation appends exactly one [`TransformationRecord`]. Records are
//! immutable once built and the ledger exposes no way to edit or remove them,
//! so the serialized ledger always mirrors execution order.
//!
//! ```
//! use polars::prelude::*;
//! use refinery::refiner::{TransformationLedger, TransformationRecord};
//!
//! let before = df!("a" => &[Some(1), None])?;
//! let after = df!("a" => &[1])?;
//!
//! let mut ledger = TransformationLedger::new();
//! ledger.append(
//!     TransformationRecord::new("handle_missing_values", &before, &after)?
//!         .with("strategy", "drop"),
//! );
//! assert_eq!(ledger.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::values::frame_missing;
use crate::error::Result;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shape and missing-cell count of a frame at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurements {
    pub rows: usize,
    pub columns: usize,
    pub missing: usize,
}

impl Measurements {
    /// # Errors
    ///
    /// Returns an error if a column cannot be scanned for missing cells.
    pub fn of(df: &DataFrame) -> Result<Self> {
        Ok(Self {
            rows: df.height(),
            columns: df.width(),
            missing: frame_missing(df)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRecord {
    operation: String,
    #[serde(flatten)]
    parameters: Map<String, Value>,
    before: Measurements,
    after: Measurements,
}

impl TransformationRecord {
    /// # Errors
    ///
    /// Returns an error if either frame cannot be measured.
    pub fn new(operation: impl Into<String>, before: &DataFrame, after: &DataFrame) -> Result<Self> {
        Ok(Self::from_measurements(
            operation,
            Measurements::of(before)?,
            Measurements::of(after)?,
        ))
    }

    pub fn from_measurements(
        operation: impl Into<String>,
        before: Measurements,
        after: Measurements,
    ) -> Self {
        Self {
            operation: operation.into(),
            parameters: Map::new(),
            before,
            after,
        }
    }

    /// Attach an operation-specific field; consumes the record so it can only
    /// be called before the record reaches a ledger.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_owned(), value.into());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn before(&self) -> Measurements {
        self.before
    }

    pub fn after(&self) -> Measurements {
        self.after
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransformationLedger {
    records: Vec<TransformationRecord>,
}

impl TransformationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TransformationRecord) {
        tracing::debug!(operation = record.operation(), "Ledger entry appended");
        self.records.push(record);
    }

    pub fn records(&self) -> &[TransformationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformationRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<TransformationRecord> {
        self.records
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
