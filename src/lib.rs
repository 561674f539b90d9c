//! # Refinery - Auditable Tabular Data Refinement
//!
//! Refinery cleans tabular datasets and records every change it makes. It
//! resolves missing values, removes duplicate rows, folds near-identical
//! category labels together and tidies column names, appending one
//! [`refiner::TransformationRecord`] per operation to a ledger that is
//! persisted next to the run metrics.
//!
//! ## Quick Start
//!
//! ```no_run
//! use refinery::config::PipelineConfig;
//! use refinery::orchestrator::StageOrchestrator;
//! use std::path::PathBuf;
//!
//! let config = PipelineConfig::load("pipeline.yaml")?;
//! refinery::logging::init(&config.logs_path)?;
//!
//! let outcome = StageOrchestrator::new(config).run(PathBuf::from("data/sales.csv"), None, "sales");
//! println!("{}", outcome.metrics.summary());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`refiner`]: refinement operations, the transformation ledger and the
//!   [`refiner::RefinementPipeline`] that runs them in order
//! - [`orchestrator`]: the load, inspect, refine, insight and save stages
//! - [`config`]: JSON/YAML pipeline configuration
//! - [`io`]: CSV, Parquet and JSON readers and writers
//! - [`error`]: error types and handling utilities
//! - [`logging`]: console and rotating-file tracing setup
//!
//! ## Refining In Memory
//!
//! The refinement pipeline works on a borrowed frame and never mutates it:
//!
//! ```
//! use polars::prelude::*;
//! use refinery::refiner::RefinementPipeline;
//!
//! let df = df!("Region" => &["North", "north", "South", "South"])?;
//! let (refined, report) = RefinementPipeline::default()
//!     .run(&df, &["clean_column_names", "unify_categories", "remove_duplicates"]);
//!
//! assert!(report.is_success());
//! assert_eq!(refined.height(), 2);
//! assert_eq!(report.transformation_log.len(), 3);
//! # Ok::<(), PolarsError>(())
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod refiner;
