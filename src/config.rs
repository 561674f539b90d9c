//! Pipeline configuration loaded from JSON or YAML.
//!
//! Every level is `#[serde(default)]`, so a config file only needs the keys it
//! changes:
//!
//! ```yaml
//! pipeline:
//!   insight:
//!     enabled: false
//!   refiner:
//!     operations: [clean_column_names, handle_missing_values, unify_categories]
//!     missing:
//!       strategy: knn
//!     similarity_threshold: 85
//! artifacts_path: out/artifacts
//! ```

use crate::error::{RefineError, Result};
use crate::refiner::RefinerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Enable flag shared by the inspector, insight and save stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggle {
    pub enabled: bool,
}

impl Default for StageToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub inspector: StageToggle,
    pub refiner: RefinerConfig,
    pub insight: StageToggle,
    pub save: StageToggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: StagesConfig,
    pub artifacts_path: PathBuf,
    pub logs_path: PathBuf,
    pub data_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline: StagesConfig::default(),
            artifacts_path: PathBuf::from("data/artifacts"),
            logs_path: PathBuf::from("logs"),
            data_path: PathBuf::from("data"),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a `.json`, `.yaml` or `.yml` config file.
    ///
    /// # Errors
    ///
    /// Returns [`RefineError::UnsupportedFormat`] for other extensions, an I/O or
    /// parse error, or whatever [`PipelineConfig::validate`] rejects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let content = std::fs::read_to_string(path)?;
        let config: Self = match extension.as_str() {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            _ => return Err(RefineError::UnsupportedFormat(path.display().to_string())),
        };
        config.validate()?;
        tracing::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`RefineError::InvalidStrategy`] for an unknown strategy or
    /// normalization name, or [`RefineError::Config`] describing the first
    /// other invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.refiner.check_strategies()?;

        let threshold = self.pipeline.refiner.similarity_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(RefineError::Config(format!(
                "similarity_threshold must be within 0-100, got {threshold}"
            )));
        }
        let drop_threshold = self.pipeline.refiner.missing.drop_threshold;
        if !(0.0..=1.0).contains(&drop_threshold) {
            return Err(RefineError::Config(format!(
                "missing.drop_threshold must be within 0-1, got {drop_threshold}"
            )));
        }
        for (key, path) in [
            ("artifacts_path", &self.artifacts_path),
            ("logs_path", &self.logs_path),
            ("data_path", &self.data_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(RefineError::Config(format!("{key} must not be empty")));
            }
        }
        if let Some(subset) = &self.pipeline.refiner.duplicate_subset
            && subset.is_empty()
        {
            return Err(RefineError::Config(
                "duplicate_subset must name at least one column".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn refiner(&self) -> &RefinerConfig {
        &self.pipeline.refiner
    }

    /// Destination used by the save stage when no output path is given.
    pub fn default_output_path(&self, dataset_name: &str) -> PathBuf {
        self.data_path
            .join(format!("{}_refined.csv", crate::io::file_stem(dataset_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refiner::{CategoricalImpute, MissingStrategy, NormalizeMethod};

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.pipeline.inspector.enabled);
        assert!(config.pipeline.save.enabled);
        assert_eq!(
            config.refiner().operations,
            vec!["clean_column_names", "handle_missing_values", "remove_duplicates"]
        );
        assert_eq!(config.refiner().missing.strategy, "smart");
        assert!((config.refiner().similarity_threshold - 80.0).abs() < f64::EPSILON);
        assert_eq!(config.artifacts_path, PathBuf::from("data/artifacts"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("pipeline.yaml");
        std::fs::write(
            &path,
            "pipeline:\n  insight:\n    enabled: false\n  refiner:\n    missing:\n      strategy: knn\n    normalize_method: robust\nlogs_path: run/logs\n",
        )?;
        let config = PipelineConfig::load(&path)?;
        assert!(!config.pipeline.insight.enabled);
        assert!(config.pipeline.inspector.enabled);
        let missing = config.refiner().missing.parse()?;
        assert_eq!(missing.strategy, MissingStrategy::Knn);
        assert_eq!(missing.categorical_strategy, CategoricalImpute::MostFrequent);
        assert_eq!(config.refiner().normalization()?, NormalizeMethod::Robust);
        assert_eq!(config.logs_path, PathBuf::from("run/logs"));
        assert_eq!(config.data_path, PathBuf::from("data"));
        Ok(())
    }

    #[test]
    fn test_json_config_and_invalid_values() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("pipeline.json");
        std::fs::write(&path, r#"{"pipeline": {"refiner": {"similarity_threshold": 120}}}"#)?;
        assert!(matches!(PipelineConfig::load(&path), Err(RefineError::Config(_))));

        std::fs::write(&path, r#"{"pipeline": {"refiner": {"missing": {"drop_threshold": 1.5}}}}"#)?;
        assert!(matches!(PipelineConfig::load(&path), Err(RefineError::Config(_))));

        std::fs::write(&path, r#"{"pipeline": {"refiner": {"missing": {"strategy": "magic"}}}}"#)?;
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(RefineError::InvalidStrategy { kind: "missing-value", ref value }) if value == "magic"
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_strategy_names_in_yaml() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("pipeline.yml");

        std::fs::write(&path, "pipeline:\n  refiner:\n    missing:\n      numeric_strategy: mode\n")?;
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(RefineError::InvalidStrategy { kind: "numeric", .. })
        ));

        std::fs::write(&path, "pipeline:\n  refiner:\n    normalize_method: log\n")?;
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(RefineError::InvalidStrategy { kind: "normalization", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_unsupported_extension() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("pipeline.toml");
        std::fs::write(&path, "")?;
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(RefineError::UnsupportedFormat(_))
        ));
        Ok(())
    }
}
