//! Dataset readers and writers, chosen by file extension.

use crate::error::{RefineError, Result, ResultExt as _};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

const INFER_SCHEMA_ROWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
    Json,
}

impl FileFormat {
    /// # Errors
    ///
    /// Returns [`RefineError::UnsupportedFormat`] for an unknown or absent extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            _ => Err(RefineError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// `name` reduced to ASCII letters, digits, `-` and `_` so it is safe as a
/// single file-name component; every other character becomes `_`.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "dataset".to_owned()
    } else {
        stem
    }
}

/// Read a CSV, Parquet or JSON dataset.
///
/// # Errors
///
/// Returns [`RefineError::UnsupportedFormat`] for other extensions, or the
/// underlying I/O or parse error.
pub fn load_frame(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let df = match FileFormat::from_path(path)? {
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .context("Failed to read CSV")?,
        FileFormat::Parquet => ParquetReader::new(File::open(path)?)
            .finish()
            .context("Failed to read Parquet")?,
        FileFormat::Json => JsonReader::new(File::open(path)?)
            .finish()
            .context("Failed to read JSON")?,
    };
    tracing::info!(
        "Loaded {} ({} rows, {} columns)",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Write `df` in the format named by the extension of `path`, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`RefineError::UnsupportedFormat`] for other extensions, or the
/// underlying I/O or write error.
pub fn save_frame(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut df = df.clone();
    let file = File::create(path)?;
    match format {
        FileFormat::Csv => CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)
            .context("Failed to write CSV file")?,
        FileFormat::Parquet => {
            ParquetWriter::new(file)
                .finish(&mut df)
                .context("Failed to write Parquet file")?;
        }
        FileFormat::Json => JsonWriter::new(file)
            .with_json_format(JsonFormat::Json)
            .finish(&mut df)
            .context("Failed to write JSON file")?,
    }
    tracing::info!("Saved {} rows to {}", df.height(), path.display());
    Ok(())
}
