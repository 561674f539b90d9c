//! Structured, multi-target logging for refinement runs.
//!
//! Logs go to the console and to daily-rotating files under the configured
//! `logs_path`:
//!
//! - `pipeline.<date>.log`: every level passing the env filter
//! - `error.<date>.log`: warnings and errors only
//!
//! ```no_run
//! use refinery::logging;
//!
//! logging::init("logs")?;
//! tracing::info!("Pipeline starting");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const MAX_LOG_FILES: usize = 10;

/// Create `logs_path` if needed and return it.
///
/// # Errors
///
/// Returns error if the directory cannot be created.
pub fn ensure_log_dir(logs_path: impl AsRef<Path>) -> Result<PathBuf> {
    let log_dir = logs_path.as_ref().to_path_buf();
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(log_dir)
}

fn appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} file appender"))
}

/// Install the global subscriber: console, all-levels file and warn-level file.
///
/// The level defaults to `info` and can be overridden with `RUST_LOG`.
///
/// # Errors
///
/// Returns error if the log directory or appenders cannot be created, or if a
/// global subscriber is already installed.
pub fn init(logs_path: impl AsRef<Path>) -> Result<()> {
    let log_dir = ensure_log_dir(logs_path)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .pretty();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(appender(&log_dir, "pipeline")?);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(appender(&log_dir, "error")?)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: {} (all levels), {} (warnings)",
        current_log_path(&log_dir).display(),
        current_error_log_path(&log_dir).display()
    );
    Ok(())
}

/// Today's all-levels log file under `logs_path`.
pub fn current_log_path(logs_path: impl AsRef<Path>) -> PathBuf {
    dated_log_path(logs_path.as_ref(), "pipeline")
}

/// Today's warn-and-above log file under `logs_path`.
pub fn current_error_log_path(logs_path: impl AsRef<Path>) -> PathBuf {
    dated_log_path(logs_path.as_ref(), "error")
}

fn dated_log_path(log_dir: &Path, prefix: &str) -> PathBuf {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    log_dir.join(format!("{prefix}.{today}.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_log_dir_creates_nested_path() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = ensure_log_dir(tmp.path().join("a").join("logs"))?;
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn test_log_file_names() {
        let path = current_log_path("logs");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("pipeline.") && name.ends_with(".log"));
        assert!(current_error_log_path("logs").starts_with("logs"));
    }
}
