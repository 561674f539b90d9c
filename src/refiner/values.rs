//! Column-kind detection and per-cell helpers shared by the refinement operations.

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Semantic kind of a column, derived from its polars dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
    Categorical,
    Temporal,
    Boolean,
    Nested,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_bool() {
            Self::Boolean
        } else if dtype.is_numeric() {
            Self::Numeric
        } else if dtype.is_temporal() {
            Self::Temporal
        } else {
            match dtype {
                DataType::String | DataType::Null => Self::Text,
                DataType::List(_) => Self::Nested,
                _ => Self::Categorical,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Text => "Text",
            Self::Categorical => "Categorical",
            Self::Temporal => "Temporal",
            Self::Boolean => "Boolean",
            Self::Nested => "Nested",
        }
    }

    /// Text and categorical columns are imputed and unified as labels.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Categorical)
    }
}

/// Column names of `df` whose kind satisfies `pred`, in frame order.
pub fn columns_of_kind(df: &DataFrame, pred: impl Fn(ColumnKind) -> bool) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| pred(ColumnKind::of(c.dtype())))
        .map(|c| c.name().to_string())
        .collect()
}

const VALUE_COLUMN: &str = "value";
const COUNT_COLUMN: &str = "count";

/// Copy of `series` with float NaN folded into null; other dtypes pass through.
///
/// # Errors
///
/// Returns an error if the float mask cannot be applied.
pub fn nan_as_null(series: &Series) -> Result<Series> {
    let out = match series.dtype() {
        DataType::Float64 => {
            let ca = series.f64()?;
            ca.set(&ca.is_nan(), None)?.into_series()
        }
        DataType::Float32 => {
            let ca = series.f32()?;
            ca.set(&ca.is_nan(), None)?.into_series()
        }
        _ => series.clone(),
    };
    Ok(out)
}

/// [`nan_as_null`] over every column of `df`.
///
/// # Errors
///
/// See [`nan_as_null`].
pub fn nan_as_null_frame(df: &DataFrame) -> Result<DataFrame> {
    if df.width() == 0 {
        return Ok(df.clone());
    }
    let columns = df
        .get_columns()
        .iter()
        .map(|c| Ok(Column::from(nan_as_null(c.as_materialized_series())?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// A numeric column as `Float64` with NaN folded into null.
///
/// # Errors
///
/// Returns an error if the column cannot be cast to `Float64`.
pub fn numeric_chunked(column: &Column) -> Result<Float64Chunked> {
    let series = column
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(nan_as_null(&series)?.f64()?.clone())
}

/// Values of a numeric column as `f64`, missing cells as `None`.
///
/// # Errors
///
/// See [`numeric_chunked`].
pub fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    Ok(numeric_chunked(column)?.into_iter().collect())
}

/// Null or NaN cells in `column`.
///
/// # Errors
///
/// See [`nan_as_null`].
pub fn missing_count(column: &Column) -> Result<usize> {
    Ok(nan_as_null(column.as_materialized_series())?.null_count())
}

/// Missing cells across the whole frame.
///
/// # Errors
///
/// See [`nan_as_null`].
pub fn frame_missing(df: &DataFrame) -> Result<usize> {
    df.get_columns()
        .iter()
        .map(missing_count)
        .sum::<Result<usize>>()
}

/// Distinct present values of `series` with their counts, most frequent
/// first and ties in ascending value order.
///
/// The frame has a `value` and a `count` column.
///
/// # Errors
///
/// Returns an error if the counts cannot be computed or sorted.
pub fn ranked_counts(series: &Series) -> Result<DataFrame> {
    let mut present = nan_as_null(series)?.drop_nulls();
    present.rename(VALUE_COLUMN.into());
    let counts = present.value_counts(false, false, COUNT_COLUMN.into(), false)?;
    Ok(counts.sort(
        [COUNT_COLUMN, VALUE_COLUMN],
        SortMultipleOptions::default().with_order_descending_multi([true, false]),
    )?)
}

/// Most frequent present value as a one-row series; ties go to the smallest.
///
/// # Errors
///
/// See [`ranked_counts`].
pub fn mode(series: &Series) -> Result<Option<Series>> {
    let ranked = ranked_counts(series)?;
    if ranked.height() == 0 {
        return Ok(None);
    }
    let top = ranked.column(VALUE_COLUMN)?.as_materialized_series().head(Some(1));
    Ok(Some(top))
}

/// The `(value, count)` pairs of [`ranked_counts`] with values rendered as text.
///
/// # Errors
///
/// See [`ranked_counts`].
pub fn top_counts(series: &Series, limit: usize) -> Result<Vec<(String, u64)>> {
    let ranked = ranked_counts(series)?.head(Some(limit));
    let values = ranked
        .column(VALUE_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let counts = ranked
        .column(COUNT_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    Ok(values
        .str()?
        .into_iter()
        .zip(counts.u64()?)
        .filter_map(|(value, count)| Some((value?.to_owned(), count?)))
        .collect())
}

/// Replace every missing cell of `series` with the first value of `filler`.
///
/// # Errors
///
/// Returns an error if `filler` cannot be cast to the dtype of `series`.
pub fn fill_missing(series: &Series, filler: &Series) -> Result<Series> {
    let series = nan_as_null(series)?;
    let filler = filler
        .cast(series.dtype())?
        .new_from_index(0, series.len());
    let present = series.is_not_null();
    Ok(series.zip_with(&present, &filler)?)
}

/// Replace every missing numeric cell with `value`; the result is `Float64`.
///
/// # Errors
///
/// Returns an error if the column is not numeric.
pub fn fill_numeric(column: &Column, value: f64) -> Result<Series> {
    let filled = numeric_chunked(column)?.fill_null_with_values(value)?;
    Ok(filled.into_series().with_name(column.name().clone()))
}

/// Replace missing cells of a text column with `value`.
///
/// # Errors
///
/// Returns an error if the column cannot be cast to `String`.
pub fn fill_text(column: &Column, value: &str) -> Result<Series> {
    let series = column.as_materialized_series().cast(&DataType::String)?;
    fill_missing(&series, &Series::new("fill".into(), [value]))
}

/// Fill missing cells with the column mode, keeping the dtype; `None` when
/// every cell is missing.
///
/// # Errors
///
/// See [`fill_missing`].
pub fn fill_with_mode(column: &Column) -> Result<Option<Series>> {
    let series = column.as_materialized_series();
    match mode(series)? {
        Some(top) => Ok(Some(fill_missing(series, &top)?)),
        None => Ok(None),
    }
}
