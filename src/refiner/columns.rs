//! Whole-frame column operations: header cleaning and numeric scaling.

use super::ledger::{TransformationLedger, TransformationRecord};
use super::values::{ColumnKind, columns_of_kind, numeric_chunked};
use crate::error::{RefineError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

const SEPARATORS: &[char] = &[' ', '/', ':', ',', '?', '(', ')', '.', '-', '\u{a0}'];

/// Lowercase, trim, strip accents and underscore-separate a single header.
pub fn clean_column_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    let folded = name
        .trim()
        .nfkd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    for c in folded.chars() {
        if c == '\'' {
            continue;
        }
        let c = if SEPARATORS.contains(&c) { '_' } else { c };
        if c == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        result.push(c);
    }
    result
}

/// Clean every header; later collisions get `_1`, `_2`, ... suffixes.
pub fn clean_column_names_list(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| {
            let base = clean_column_name(name);
            let mut clean = base.clone();
            let mut count = 0;
            while seen.contains(&clean) {
                count += 1;
                clean = format!("{base}_{count}");
            }
            seen.insert(clean.clone());
            clean
        })
        .collect()
}

/// Rename every column of `df` to its cleaned form and append one ledger record.
///
/// # Errors
///
/// Returns an error if the renamed frame cannot be assembled.
pub fn clean_column_names(df: &DataFrame, ledger: &mut TransformationLedger) -> Result<DataFrame> {
    tracing::info!("Cleaning column names");

    let before: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let after = clean_column_names_list(&before);

    let columns: Vec<Column> = df
        .get_columns()
        .iter()
        .zip(&after)
        .map(|(column, name)| {
            let mut column = column.clone();
            column.rename(name.as_str().into());
            column
        })
        .collect();
    let out = DataFrame::new(columns)?;

    let renamed = before.iter().zip(&after).filter(|(b, a)| b != a).count();
    ledger.append(
        TransformationRecord::new("clean_column_names", df, &out)?
            .with("columns_before", before)
            .with("columns_after", after),
    );
    tracing::info!("Column names cleaned ({renamed} renamed)");
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NormalizeMethod {
    /// `(x - mean) / std`, population std.
    #[default]
    Standard,
    /// `(x - min) / (max - min)`.
    MinMax,
    /// `(x - median) / IQR`.
    Robust,
}

impl NormalizeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::MinMax => "minmax",
            Self::Robust => "robust",
        }
    }

    /// Center and scale over the present values; `None` when there are none.
    fn parameters(self, values: &Float64Chunked) -> Result<Option<(f64, f64)>> {
        let quantile = |q| values.quantile(q, QuantileMethod::Linear);
        Ok(match self {
            Self::Standard => values.mean().zip(values.std(0)),
            Self::MinMax => values.min().zip(values.max()).map(|(min, max)| (min, max - min)),
            Self::Robust => match (quantile(0.5)?, quantile(0.25)?, quantile(0.75)?) {
                (Some(median), Some(q1), Some(q3)) => Some((median, q3 - q1)),
                _ => None,
            },
        })
    }
}

impl std::fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMethod {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "minmax" => Ok(Self::MinMax),
            "robust" => Ok(Self::Robust),
            _ => Err(RefineError::invalid_strategy("normalization", s)),
        }
    }
}

/// Scale one numeric column; the result is `Float64` with missing cells kept.
///
/// A zero scale (constant column) only centers the values.
///
/// # Errors
///
/// Returns an error if the column cannot be read as `Float64`.
pub fn normalize_column(column: &Column, method: NormalizeMethod) -> Result<Series> {
    let values = numeric_chunked(column)?;
    let scaled = match method.parameters(&values)? {
        Some((centre, scale)) if scale != 0.0 => (&values - centre) / scale,
        Some((centre, _)) => &values - centre,
        None => values,
    };
    Ok(scaled.into_series().with_name(column.name().clone()))
}

/// Scale every numeric column of `df` and append one ledger record.
///
/// # Errors
///
/// Returns an error if a column cannot be scaled or replaced.
pub fn normalize_numeric_columns(
    df: &DataFrame,
    method: NormalizeMethod,
    ledger: &mut TransformationLedger,
) -> Result<DataFrame> {
    let numeric = columns_of_kind(df, |kind| kind == ColumnKind::Numeric);
    if numeric.is_empty() {
        tracing::warn!("No numeric columns to normalize");
    } else {
        tracing::info!("Normalizing {} numeric columns ({method})", numeric.len());
    }

    let mut out = df.clone();
    for name in &numeric {
        let scaled = normalize_column(df.column(name)?, method)?;
        out.with_column(scaled)?;
    }

    ledger.append(
        TransformationRecord::new("normalize_numeric_columns", df, &out)?
            .with("method", method.as_str())
            .with("columns", numeric),
    );
    Ok(out)
}
