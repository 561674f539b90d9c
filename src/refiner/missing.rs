//! Missing-value resolution: drop, simple, k-nearest-neighbour and smart policies.

use super::ledger::{TransformationLedger, TransformationRecord};
use super::values::{
    ColumnKind, fill_numeric, fill_text, fill_with_mode, frame_missing, missing_count, mode,
    nan_as_null_frame, numeric_chunked, numeric_values,
};
use crate::error::{RefineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default share of missing cells above which [`MissingStrategy::Smart`] drops a column.
pub const SMART_DROP_FRACTION: f64 = 0.5;

/// Fill value for text columns that have no mode under the smart strategy.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Fill value for [`CategoricalImpute::Constant`].
pub const CONSTANT_LABEL: &str = "missing_value";

/// Neighbours consulted by [`MissingStrategy::Knn`].
pub const KNN_NEIGHBOURS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingStrategy {
    Drop,
    Simple,
    Knn,
    #[default]
    Smart,
}

impl MissingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Simple => "simple",
            Self::Knn => "knn",
            Self::Smart => "smart",
        }
    }
}

impl FromStr for MissingStrategy {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "simple" => Ok(Self::Simple),
            "knn" => Ok(Self::Knn),
            "smart" => Ok(Self::Smart),
            _ => Err(RefineError::invalid_strategy("missing-value", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericImpute {
    Mean,
    #[default]
    Median,
    MostFrequent,
}

impl NumericImpute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::MostFrequent => "most_frequent",
        }
    }

    fn statistic(self, values: &Float64Chunked) -> Result<Option<f64>> {
        Ok(match self {
            Self::Mean => values.mean(),
            Self::Median => values.median(),
            Self::MostFrequent => match mode(&values.clone().into_series())? {
                Some(top) => top.f64()?.get(0),
                None => None,
            },
        })
    }
}

impl FromStr for NumericImpute {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "most_frequent" => Ok(Self::MostFrequent),
            _ => Err(RefineError::invalid_strategy("numeric", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoricalImpute {
    #[default]
    MostFrequent,
    Constant,
}

impl CategoricalImpute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MostFrequent => "most_frequent",
            Self::Constant => "constant",
        }
    }
}

impl FromStr for CategoricalImpute {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "most_frequent" => Ok(Self::MostFrequent),
            "constant" => Ok(Self::Constant),
            _ => Err(RefineError::invalid_strategy("categorical", s)),
        }
    }
}

/// Policy bundle for [`MissingValueResolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissingValueConfig {
    pub strategy: MissingStrategy,
    pub numeric_strategy: NumericImpute,
    pub categorical_strategy: CategoricalImpute,
    /// Smart strategy only: columns missing more than this share are dropped.
    pub drop_threshold: f64,
}

impl Default for MissingValueConfig {
    fn default() -> Self {
        Self {
            strategy: MissingStrategy::default(),
            numeric_strategy: NumericImpute::default(),
            categorical_strategy: CategoricalImpute::default(),
            drop_threshold: SMART_DROP_FRACTION,
        }
    }
}

impl MissingValueConfig {
    /// Build a config from raw strategy names.
    ///
    /// # Errors
    ///
    /// Returns [`RefineError::InvalidStrategy`] for any name that does not parse.
    pub fn parse(strategy: &str, numeric: &str, categorical: &str) -> Result<Self> {
        Ok(Self {
            strategy: strategy.parse()?,
            numeric_strategy: numeric.parse()?,
            categorical_strategy: categorical.parse()?,
            drop_threshold: SMART_DROP_FRACTION,
        })
    }
}

/// Strategy names as written in a pipeline config.
///
/// Names stay raw until [`MissingValueSettings::parse`], so a misspelt name
/// surfaces as [`RefineError::InvalidStrategy`] rather than a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingValueSettings {
    pub strategy: String,
    pub numeric_strategy: String,
    pub categorical_strategy: String,
    pub drop_threshold: f64,
}

impl MissingValueSettings {
    /// # Errors
    ///
    /// Returns [`RefineError::InvalidStrategy`] for the first name that does not parse.
    pub fn parse(&self) -> Result<MissingValueConfig> {
        Ok(MissingValueConfig {
            drop_threshold: self.drop_threshold,
            ..MissingValueConfig::parse(
                &self.strategy,
                &self.numeric_strategy,
                &self.categorical_strategy,
            )?
        })
    }
}

impl From<MissingValueConfig> for MissingValueSettings {
    fn from(config: MissingValueConfig) -> Self {
        Self {
            strategy: config.strategy.as_str().to_owned(),
            numeric_strategy: config.numeric_strategy.as_str().to_owned(),
            categorical_strategy: config.categorical_strategy.as_str().to_owned(),
            drop_threshold: config.drop_threshold,
        }
    }
}

impl Default for MissingValueSettings {
    fn default() -> Self {
        MissingValueConfig::default().into()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MissingValueResolver {
    config: MissingValueConfig,
}

impl MissingValueResolver {
    pub fn new(config: MissingValueConfig) -> Self {
        Self { config }
    }

    pub fn with_strategy(strategy: MissingStrategy) -> Self {
        Self::new(MissingValueConfig {
            strategy,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &MissingValueConfig {
        &self.config
    }

    /// Apply the configured policy and append one ledger record.
    ///
    /// # Errors
    ///
    /// Returns an error if a column cannot be read or rewritten.
    pub fn resolve(&self, df: &DataFrame, ledger: &mut TransformationLedger) -> Result<DataFrame> {
        let strategy = self.config.strategy;
        tracing::info!("Handling missing values with strategy: {}", strategy.as_str());

        let missing_before = frame_missing(df)?;
        let (resolved, record) = match strategy {
            MissingStrategy::Drop => self.drop_rows(df)?,
            MissingStrategy::Simple => self.simple(df)?,
            MissingStrategy::Knn => self.knn(df)?,
            MissingStrategy::Smart => self.smart(df)?,
        };
        let record = record.with("strategy", strategy.as_str());
        let missing_after = record.after().missing;
        ledger.append(record);

        tracing::info!("Missing values: {missing_before} → {missing_after}");
        Ok(resolved)
    }

    fn drop_rows(&self, df: &DataFrame) -> Result<(DataFrame, TransformationRecord)> {
        // rows that survive hold no NaN, so the folded frame equals the input on them
        let out = nan_as_null_frame(df)?.drop_nulls::<String>(None)?;
        let rows_dropped = df.height() - out.height();
        tracing::info!("Dropped {rows_dropped} rows containing missing values");

        let record =
            TransformationRecord::new("handle_missing_values", df, &out)?.with("rows_dropped", rows_dropped);
        Ok((out, record))
    }

    fn simple(&self, df: &DataFrame) -> Result<(DataFrame, TransformationRecord)> {
        let numeric = self.config.numeric_strategy;
        let mut out = df.clone();
        let mut imputed = Vec::new();

        for column in df.get_columns() {
            if missing_count(column)? == 0 {
                continue;
            }
            let name = column.name().to_string();
            let filled = match ColumnKind::of(column.dtype()) {
                ColumnKind::Numeric => match numeric.statistic(&numeric_chunked(column)?)? {
                    Some(value) => Some(fill_numeric(column, value)?),
                    None => None,
                },
                kind if kind.is_textual() => match self.config.categorical_strategy {
                    CategoricalImpute::MostFrequent => fill_with_mode(column)?,
                    CategoricalImpute::Constant => Some(fill_text(column, CONSTANT_LABEL)?),
                },
                _ => None,
            };
            if let Some(series) = filled {
                out.with_column(series)?;
                imputed.push(name);
            } else {
                tracing::debug!("Column '{name}' left unchanged: nothing to impute from");
            }
        }

        let record = TransformationRecord::new("handle_missing_values", df, &out)?
            .with("numeric_strategy", numeric.as_str())
            .with("categorical_strategy", self.config.categorical_strategy.as_str())
            .with("columns_imputed", imputed);
        Ok((out, record))
    }

    fn knn(&self, df: &DataFrame) -> Result<(DataFrame, TransformationRecord)> {
        let mut out = df.clone();
        let mut imputed = Vec::new();

        let numeric: Vec<&Column> = df
            .get_columns()
            .iter()
            .filter(|c| ColumnKind::of(c.dtype()) == ColumnKind::Numeric)
            .collect();
        let matrix: Vec<Vec<Option<f64>>> = numeric
            .iter()
            .map(|c| numeric_values(c))
            .collect::<Result<_>>()?;

        if numeric.is_empty() {
            tracing::debug!("No numeric columns for KNN imputation");
        }
        for (target, column) in numeric.iter().enumerate() {
            if let Some(values) = knn_impute_column(&matrix, target, KNN_NEIGHBOURS) {
                let series = Series::new(column.name().clone(), values);
                out.with_column(series)?;
                imputed.push(column.name().to_string());
            }
        }

        for column in df.get_columns() {
            if !ColumnKind::of(column.dtype()).is_textual() || missing_count(column)? == 0 {
                continue;
            }
            if let Some(series) = fill_with_mode(column)? {
                out.with_column(series)?;
                imputed.push(column.name().to_string());
            }
        }

        let record = TransformationRecord::new("handle_missing_values", df, &out)?
            .with("n_neighbors", KNN_NEIGHBOURS)
            .with("columns_imputed", imputed);
        Ok((out, record))
    }

    fn smart(&self, df: &DataFrame) -> Result<(DataFrame, TransformationRecord)> {
        let mut out = df.clone();
        let mut dropped = Vec::new();
        let mut imputed = Vec::new();
        let height = df.height();

        for column in df.get_columns() {
            let missing = missing_count(column)?;
            if missing == 0 || height == 0 {
                continue;
            }
            let name = column.name().to_string();
            let fraction = missing as f64 / height as f64;

            if fraction > self.config.drop_threshold {
                out = out.drop(&name)?;
                tracing::debug!("Dropped column '{name}' ({:.1}% missing)", fraction * 100.0);
                dropped.push(name);
                continue;
            }

            let kind = ColumnKind::of(column.dtype());
            let filled = if kind == ColumnKind::Numeric {
                match numeric_chunked(column)?.median() {
                    Some(value) => Some(fill_numeric(column, value)?),
                    None => None,
                }
            } else {
                match fill_with_mode(column)? {
                    Some(series) => Some(series),
                    None if kind.is_textual() => Some(fill_text(column, UNKNOWN_LABEL)?),
                    None => None,
                }
            };
            if let Some(series) = filled {
                out.with_column(series)?;
                imputed.push(name);
            }
        }

        let record = TransformationRecord::new("handle_missing_values", df, &out)?
            .with("drop_threshold", self.config.drop_threshold)
            .with("columns_dropped", dropped)
            .with("columns_imputed", imputed);
        Ok((out, record))
    }
}

/// Distance-weighted KNN imputation of column `target` of a column-major matrix.
///
/// Distances are NaN-Euclidean over the coordinates both rows share, scaled up
/// by `columns / shared`. Donors are rows where `target` is present. A recipient
/// with no usable donor gets the column mean. Returns `None` when the column has
/// nothing missing or nothing present.
fn knn_impute_column(
    matrix: &[Vec<Option<f64>>],
    target: usize,
    k: usize,
) -> Option<Vec<Option<f64>>> {
    let column = matrix.get(target)?;
    let present: Vec<f64> = column.iter().flatten().copied().collect();
    if present.len() == column.len() || present.is_empty() {
        return None;
    }
    let fallback = present.iter().sum::<f64>() / present.len() as f64;
    let width = matrix.len() as f64;

    let cell = |col: usize, row: usize| matrix.get(col).and_then(|c| c.get(row)).copied().flatten();

    let distance = |a: usize, b: usize| -> Option<f64> {
        let mut shared = 0_usize;
        let mut sum = 0.0;
        for col in 0..matrix.len() {
            if col == target {
                continue;
            }
            if let (Some(x), Some(y)) = (cell(col, a), cell(col, b)) {
                shared += 1;
                sum += (x - y).powi(2);
            }
        }
        (shared > 0).then(|| (width / shared as f64 * sum).sqrt())
    };

    let imputed = column
        .iter()
        .enumerate()
        .map(|(row, value)| {
            if value.is_some() {
                return *value;
            }
            let mut donors: Vec<(f64, f64)> = column
                .iter()
                .enumerate()
                .filter_map(|(other, v)| Some((distance(row, other)?, (*v)?)))
                .collect();
            donors.sort_by(|a, b| a.0.total_cmp(&b.0));
            donors.truncate(k);

            if donors.is_empty() {
                return Some(fallback);
            }
            let exact: Vec<f64> = donors.iter().filter(|(d, _)| *d == 0.0).map(|(_, v)| *v).collect();
            if !exact.is_empty() {
                return Some(exact.iter().sum::<f64>() / exact.len() as f64);
            }
            let weight_sum: f64 = donors.iter().map(|(d, _)| 1.0 / d).sum();
            Some(donors.iter().map(|(d, v)| v / d).sum::<f64>() / weight_sum)
        })
        .collect();
    Some(imputed)
}
