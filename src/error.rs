//! Centralized error handling for refinement operations.
//!
//! Component-level operations (missing values, duplicates, category
//! unification) return [`RefineError`]. Two kinds are worth telling apart
//! when matching:
//!
//! - [`RefineError::ColumnNotFound`] is recoverable: the caller logs a warning
//!   and passes the dataset through unchanged.
//! - [`RefineError::InvalidStrategy`] is a caller error and should propagate.
//!
//! ```
//! use refinery::error::RefineError;
//!
//! fn describe(err: &RefineError) -> &'static str {
//!     if err.is_recoverable() {
//!         "skipped"
//!     } else {
//!         "failed"
//!     }
//! }
//!
//! let err = RefineError::ColumnNotFound("region".to_owned());
//! assert_eq!(describe(&err), "skipped");
//! ```
//!
//! The orchestrator works with `anyhow::Error` at stage boundaries; a
//! `RefineError` converts into it through `?`.

use thiserror::Error;

/// Main error type for refinement operations.
#[derive(Debug, Error)]
pub enum RefineError {
    /// A named column is absent from the dataset
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A strategy or method name that does not parse
    #[error("Invalid {kind} strategy: {value}")]
    InvalidStrategy { kind: &'static str, value: String },

    /// File extension with no reader or writer behind it
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Polars errors (casting, filtering, parsing, etc.)
    #[error("Data processing error: {0}")]
    Data(#[from] polars::error::PolarsError),

    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration that parsed but does not validate
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl RefineError {
    pub fn invalid_strategy(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidStrategy {
            kind,
            value: value.into(),
        }
    }

    /// Whether the caller may log and continue with the dataset unchanged.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ColumnNotFound(_))
    }
}

/// Result type alias for refinement operations.
pub type Result<T> = std::result::Result<T, RefineError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with `msg`.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with the closure's message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<RefineError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: RefineError = e.into();
            RefineError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: RefineError = e.into();
            RefineError::Other(format!("{}: {}", f(), err))
        })
    }
}
