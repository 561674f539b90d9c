//! End-to-end runs over the fixture files in `testdata/`.

use polars::prelude::*;
use refinery::config::PipelineConfig;
use refinery::orchestrator::{StageName, StageOrchestrator, StageStatus};
use refinery::refiner::RunStatus;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

fn config_in(dir: &Path) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::load(fixture("pipeline.yaml"))?;
    config.artifacts_path = dir.join("artifacts");
    config.logs_path = dir.join("logs");
    config.data_path = dir.join("data");
    Ok(config)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[test]
fn test_full_run_refines_and_persists_artifacts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = config_in(tmp.path())?;
    let outcome = StageOrchestrator::new(config).run(fixture("customers.csv"), None, "customers");

    assert_eq!(outcome.status, RunStatus::Success, "{:?}", outcome.error);
    let stages: Vec<(StageName, StageStatus)> = outcome
        .metrics
        .stages
        .iter()
        .map(|r| (r.stage(), r.status()))
        .collect();
    assert_eq!(
        stages,
        StageName::ORDER
            .iter()
            .map(|s| (*s, StageStatus::Success))
            .collect::<Vec<_>>()
    );

    let df = outcome.data.ok_or_else(|| anyhow::anyhow!("no data"))?;
    assert_eq!(
        df.get_column_names_str(),
        vec!["customer_id", "full_name", "region", "age"]
    );
    assert_eq!(df.height(), 5);

    let regions: Vec<Option<&str>> = df.column("region")?.as_materialized_series().str()?.into_iter().collect();
    assert_eq!(
        regions,
        vec![Some("North"), Some("North"), Some("South"), Some("N"), Some("South")]
    );
    let ages: Vec<Option<f64>> = df.column("age")?.as_materialized_series().f64()?.into_iter().collect();
    assert_eq!(ages[1], Some(39.5));

    let artifacts = tmp.path().join("artifacts");
    let ledger = read_json(&artifacts.join("transformation_log_customers.json"))?;
    let ops: Vec<&str> = ledger
        .as_array()
        .map(|records| records.iter().filter_map(|r| r["operation"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(
        ops,
        vec![
            "clean_column_names",
            "handle_missing_values",
            "remove_duplicates",
            "unify_categories"
        ]
    );
    assert_eq!(ledger[1]["columns_dropped"], serde_json::json!(["score", "notes"]));
    assert_eq!(ledger[2]["duplicates_removed"], 1);
    assert_eq!(ledger[3]["unified_count"], 2);

    let metrics = read_json(&artifacts.join("pipeline_metrics_customers.json"))?;
    assert_eq!(metrics["status"], "success");
    assert_eq!(metrics["dataset"], "customers");
    assert_eq!(metrics["stages"].as_array().map(Vec::len), Some(5));

    let saved = tmp.path().join("data").join("customers_refined.csv");
    assert!(saved.is_file());
    Ok(())
}

#[test]
fn test_explicit_output_path_and_format() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = config_in(tmp.path())?;
    let output = tmp.path().join("out").join("customers.parquet");
    let outcome = StageOrchestrator::new(config).run(fixture("customers.csv"), Some(&output), "customers");

    assert!(outcome.is_success());
    let back = refinery::io::load_frame(&output)?;
    assert_eq!(back.height(), 5);
    Ok(())
}

#[test]
fn test_unsupported_output_format_fails_save_stage() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config = config_in(tmp.path())?;
    let output = tmp.path().join("customers.xlsx");
    let outcome = StageOrchestrator::new(config).run(fixture("customers.csv"), Some(&output), "customers");

    assert_eq!(outcome.status, RunStatus::Failed);
    let save = outcome.metrics.stage(StageName::Save);
    assert_eq!(save.map(|r| r.status()), Some(StageStatus::Failed));
    assert!(
        save.and_then(|r| r.error())
            .is_some_and(|e| e.contains("Unsupported format"))
    );
    assert!(outcome.data.is_none());
    Ok(())
}

#[test]
fn test_in_memory_frame_input() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut config = config_in(tmp.path())?;
    config.pipeline.save.enabled = false;

    let df = df!(
        "Team" => &[Some("Green"), Some("green"), None, Some("Red")],
        "Points" => &[Some(3.0), Some(1.0), Some(2.0), None]
    )?;
    let outcome = StageOrchestrator::new(config).run(df, None, "teams");

    assert!(outcome.is_success());
    let inspect = outcome
        .metrics
        .stage(StageName::Inspect)
        .and_then(|r| r.results())
        .cloned()
        .unwrap_or_default();
    assert_eq!(inspect["missing_cells"], 2);

    let df = outcome.data.ok_or_else(|| anyhow::anyhow!("no data"))?;
    let teams: Vec<Option<&str>> = df.column("team")?.as_materialized_series().str()?.into_iter().collect();
    assert_eq!(teams, vec![Some("Green"), Some("Green"), Some("Green"), Some("Red")]);
    Ok(())
}
