//! Dataset refinement: missing values, duplicates, category unification and
//! column clean-up, each recorded in a [`TransformationLedger`].

pub mod categories;
pub mod columns;
pub mod duplicates;
pub mod ledger;
pub mod missing;
pub mod pipeline;
pub mod values;

pub use categories::{CategoryCluster, CategoryUnifier, Unification, similarity};
pub use columns::{NormalizeMethod, clean_column_names, normalize_numeric_columns};
pub use duplicates::DuplicateRowEliminator;
pub use ledger::{Measurements, TransformationLedger, TransformationRecord};
pub use missing::{
    CategoricalImpute, MissingStrategy, MissingValueConfig, MissingValueResolver, MissingValueSettings,
    NumericImpute,
};
pub use pipeline::{Operation, RefineReport, RefinementPipeline, RefinerConfig, RunStatus};
pub use values::ColumnKind;

#[cfg(test)]
mod tests;
