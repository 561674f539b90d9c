//! Exact-duplicate row elimination.

use super::ledger::{TransformationLedger, TransformationRecord};
use super::values::nan_as_null_frame;
use crate::error::{RefineError, Result};
use polars::prelude::*;
use serde_json::Value;

const ROW_INDEX: &str = "__refinery_row";

/// Removes rows equal to an earlier row on every subset column.
#[derive(Debug, Clone, Default)]
pub struct DuplicateRowEliminator {
    subset: Option<Vec<String>>,
}

impl DuplicateRowEliminator {
    pub fn new(subset: Option<Vec<String>>) -> Self {
        Self { subset }
    }

    pub fn subset(&self) -> Option<&[String]> {
        self.subset.as_deref()
    }

    /// Keep the first occurrence of each distinct row and append one ledger record.
    ///
    /// # Errors
    ///
    /// Returns [`RefineError::ColumnNotFound`] if the subset names an absent column.
    pub fn eliminate(&self, df: &DataFrame, ledger: &mut TransformationLedger) -> Result<DataFrame> {
        tracing::info!("Removing duplicates");

        let out = drop_duplicate_rows(df, self.subset())?;
        let duplicates_removed = df.height() - out.height();

        let subset = self
            .subset
            .as_ref()
            .map_or(Value::Null, |cols| Value::from(cols.clone()));
        ledger.append(
            TransformationRecord::new("remove_duplicates", df, &out)?
                .with("duplicates_removed", duplicates_removed)
                .with("subset", subset),
        );

        tracing::info!(
            subset = ?self.subset,
            "Duplicates removed: {duplicates_removed}"
        );
        Ok(out)
    }
}

/// Keep the first occurrence of every distinct row of `subset` (all columns
/// when `None`), in original order.
///
/// Null and NaN compare equal to each other.
///
/// # Errors
///
/// Returns [`RefineError::ColumnNotFound`] for an unknown subset column.
pub fn drop_duplicate_rows(df: &DataFrame, subset: Option<&[String]>) -> Result<DataFrame> {
    let subset: Vec<String> = match subset {
        Some(names) => {
            if let Some(absent) = names.iter().find(|name| df.column(name).is_err()) {
                return Err(RefineError::ColumnNotFound(absent.clone()));
            }
            names.to_vec()
        }
        None => df
            .get_column_names_str()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    };
    if subset.is_empty() || df.height() == 0 {
        return Ok(df.clone());
    }

    let keyed = nan_as_null_frame(df)?.with_row_index(ROW_INDEX.into(), None)?;
    let firsts = keyed.unique_stable(Some(subset.as_slice()), UniqueKeepStrategy::First, None)?;
    let rows = firsts.column(ROW_INDEX)?.as_materialized_series().idx()?.clone();
    Ok(df.take(&rows)?)
}

/// Number of rows that repeat an earlier row.
///
/// # Errors
///
/// See [`drop_duplicate_rows`].
pub fn count_duplicates(df: &DataFrame, subset: Option<&[String]>) -> Result<usize> {
    Ok(df.height() - drop_duplicate_rows(df, subset)?.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_first_occurrence() -> anyhow::Result<()> {
        let df = df!(
            "letter" => &["A", "B", "A", "C", "B"],
            "pos" => &[1, 2, 3, 4, 5]
        )?;
        let subset = vec!["letter".to_owned()];
        assert_eq!(count_duplicates(&df, Some(subset.as_slice()))?, 2);

        let out = drop_duplicate_rows(&df, Some(subset.as_slice()))?;
        let pos: Vec<Option<i32>> = out.column("pos")?.as_materialized_series().i32()?.into_iter().collect();
        assert_eq!(pos, vec![Some(1), Some(2), Some(4)]);
        Ok(())
    }

    #[test]
    fn test_missing_values_compare_equal() -> anyhow::Result<()> {
        let df = df!(
            "a" => &[None, None, Some(1.0), Some(f64::NAN)],
            "b" => &["x", "x", "y", "x"]
        )?;
        // rows 0, 1 and 3 all read as (missing, "x")
        assert_eq!(count_duplicates(&df, None)?, 2);
        let out = drop_duplicate_rows(&df, None)?;
        assert_eq!(out.height(), 2);
        // kept rows are returned as they were
        assert_eq!(out.column("a")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_subset_column() -> anyhow::Result<()> {
        let df = df!("a" => &[1, 1])?;
        let subset = vec!["nope".to_owned()];
        let err = drop_duplicate_rows(&df, Some(subset.as_slice())).unwrap_err();
        assert!(matches!(err, RefineError::ColumnNotFound(ref c) if c == "nope"));
        Ok(())
    }
}
