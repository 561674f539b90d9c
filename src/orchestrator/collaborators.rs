//! Stage collaborators and their built-in implementations.
//!
//! Each collaborator is a trait so a run can swap in its own inspector,
//! refiner or insight generator; the orchestrator only sees the trait.

use crate::refiner::duplicates::count_duplicates;
use crate::refiner::values::{
    ColumnKind, columns_of_kind, frame_missing, missing_count, numeric_chunked, top_counts,
};
use crate::refiner::{RefineReport, RefinementPipeline};
use anyhow::Result;
use polars::prelude::cov::pearson_corr;
use polars::prelude::*;
use serde_json::{Map, Value, json};

/// Profiles and validates a freshly loaded dataset.
pub trait Inspector: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the dataset cannot be profiled.
    fn inspect(&self, df: &DataFrame) -> Result<Value>;
}

/// Refines a dataset, returning the report with its transformation ledger.
pub trait Refiner: Send + Sync {
    /// # Errors
    ///
    /// Returns error if refinement cannot start; failures inside individual
    /// operations are carried in the report status.
    fn refine(&self, df: &DataFrame) -> Result<(DataFrame, RefineReport)>;
}

/// Derives summary insights from the refined dataset.
pub trait Insight: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the dataset cannot be summarized.
    fn analyze(&self, df: &DataFrame) -> Result<Value>;
}

impl Refiner for RefinementPipeline {
    fn refine(&self, df: &DataFrame) -> Result<(DataFrame, RefineReport)> {
        Ok(self.run_configured(df))
    }
}

/// Shape, missing-cell, duplicate and column-kind profile, plus two built-in
/// expectations: at least one row, and no column that is entirely missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileInspector;

impl Inspector for ProfileInspector {
    fn inspect(&self, df: &DataFrame) -> Result<Value> {
        let mut fully_missing = Vec::new();
        for column in df.get_columns() {
            if df.height() > 0 && missing_count(column)? == df.height() {
                fully_missing.push(column.name().to_string());
            }
        }

        let expectations = [
            json!({
                "expectation": "row_count_at_least_1",
                "success": df.height() >= 1,
                "observed": df.height(),
            }),
            json!({
                "expectation": "no_fully_missing_columns",
                "success": fully_missing.is_empty(),
                "columns": fully_missing,
            }),
        ];
        let passed = expectations
            .iter()
            .filter(|e| e["success"].as_bool() == Some(true))
            .count();
        let success_percent = passed as f64 * 100.0 / expectations.len() as f64;
        if passed < expectations.len() {
            tracing::warn!("Inspection expectations: {passed}/{} passed", expectations.len());
        }

        Ok(json!({
            "rows": df.height(),
            "columns": df.width(),
            "missing_cells": frame_missing(df)?,
            "duplicate_rows": count_duplicates(df, None)?,
            "numeric_columns": columns_of_kind(df, |k| k == ColumnKind::Numeric),
            "categorical_columns": columns_of_kind(df, |k| k.is_textual()),
            "temporal_columns": columns_of_kind(df, |k| k == ColumnKind::Temporal),
            "boolean_columns": columns_of_kind(df, |k| k == ColumnKind::Boolean),
            "validation": {
                "expectations": expectations,
                "success_percent": success_percent,
            },
        }))
    }
}

/// Numeric describe, top categories and strong correlations.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInsight {
    pub top_categories: usize,
    pub correlation_threshold: f64,
}

impl Default for SummaryInsight {
    fn default() -> Self {
        Self {
            top_categories: 5,
            correlation_threshold: 0.7,
        }
    }
}

impl Insight for SummaryInsight {
    fn analyze(&self, df: &DataFrame) -> Result<Value> {
        let numeric = columns_of_kind(df, |k| k == ColumnKind::Numeric);
        let mut describe = Map::new();
        let mut series = Vec::with_capacity(numeric.len());
        for name in &numeric {
            let values = numeric_chunked(df.column(name)?)?;
            describe.insert(name.clone(), describe_column(&values)?);
            series.push(values);
        }

        let mut categories = Map::new();
        for name in columns_of_kind(df, |k| k.is_textual()) {
            let top = top_counts(df.column(&name)?.as_materialized_series(), self.top_categories)?;
            let top: Vec<Value> = top
                .into_iter()
                .map(|(value, count)| json!({"value": value, "count": count}))
                .collect();
            categories.insert(name, Value::Array(top));
        }

        let mut correlations = Vec::new();
        for (i, left) in numeric.iter().enumerate() {
            for (j, right) in numeric.iter().enumerate().skip(i + 1) {
                if let Some(r) = pearson(&series[i], &series[j])?
                    && r.abs() >= self.correlation_threshold
                {
                    correlations.push(json!({"left": left, "right": right, "r": r}));
                }
            }
        }
        tracing::info!(
            "Insight: {} numeric columns, {} strong correlations",
            numeric.len(),
            correlations.len()
        );

        Ok(json!({
            "describe": describe,
            "top_categories": categories,
            "strong_correlations": correlations,
        }))
    }
}

/// `count/mean/std/min/25%/50%/75%/max` over present values; sample std.
fn describe_column(values: &Float64Chunked) -> Result<Value> {
    let quantile = |q| values.quantile(q, QuantileMethod::Linear);
    Ok(json!({
        "count": values.len() - values.null_count(),
        "mean": values.mean(),
        "std": values.std(1),
        "min": values.min(),
        "25%": quantile(0.25)?,
        "50%": quantile(0.5)?,
        "75%": quantile(0.75)?,
        "max": values.max(),
    }))
}

/// Pearson correlation over rows where both values are present.
fn pearson(a: &Float64Chunked, b: &Float64Chunked) -> Result<Option<f64>> {
    let both = &a.is_not_null() & &b.is_not_null();
    let (a, b) = (a.filter(&both)?, b.filter(&both)?);
    if a.len() < 2 {
        return Ok(None);
    }
    Ok(pearson_corr(&a, &b).filter(|r| r.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_flags_fully_missing_column() -> Result<()> {
        let df = df!(
            "id" => &[1, 2, 2],
            "empty" => &[None::<f64>, None, None],
            "label" => &["a", "b", "b"]
        )?;
        let profile = ProfileInspector.inspect(&df)?;
        assert_eq!(profile["rows"], 3);
        assert_eq!(profile["missing_cells"], 3);
        assert_eq!(profile["duplicate_rows"], 1);
        assert_eq!(profile["categorical_columns"], json!(["label"]));
        assert_eq!(profile["validation"]["success_percent"], 50.0);
        assert_eq!(
            profile["validation"]["expectations"][1]["columns"],
            json!(["empty"])
        );
        Ok(())
    }

    #[test]
    fn test_summary_insight() -> Result<()> {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "y" => &[2.0, 4.0, 6.0, 8.5],
            "z" => &[5.0, 1.0, 4.0, 2.0],
            "colour" => &["red", "blue", "red", "green"]
        )?;
        let insight = SummaryInsight::default().analyze(&df)?;

        assert_eq!(insight["describe"]["x"]["count"], 4);
        assert_eq!(insight["describe"]["x"]["50%"], 2.5);
        assert_eq!(insight["top_categories"]["colour"][0], json!({"value": "red", "count": 2}));

        let pairs = insight["strong_correlations"].as_array().map_or(0, Vec::len);
        assert_eq!(pairs, 1);
        assert_eq!(insight["strong_correlations"][0]["left"], "x");
        assert_eq!(insight["strong_correlations"][0]["right"], "y");
        Ok(())
    }

    #[test]
    fn test_pearson_needs_variance() -> Result<()> {
        let flat = Float64Chunked::from_slice("a".into(), &[1.0, 1.0]);
        let rising = Float64Chunked::from_slice("b".into(), &[1.0, 2.0]);
        assert_eq!(pearson(&flat, &rising)?, None);

        let a = Float64Chunked::from_slice_options("a".into(), &[Some(1.0), Some(2.0), None]);
        let b = Float64Chunked::from_slice_options("b".into(), &[Some(3.0), Some(1.0), Some(9.0)]);
        let r = pearson(&a, &b)?;
        assert!(r.is_some_and(|r| (r + 1.0).abs() < 1e-9));
        Ok(())
    }
}
