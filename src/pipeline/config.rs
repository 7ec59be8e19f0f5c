//! Sweep configuration.
//!
//! This module provides the knobs of a sweep run: concurrency, label
//! handling, retry and cache middleware, and the data source. It also reads
//! hyperparameter grids from inline JSON or from JSON/YAML files.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dataset::{DatasetSchema, DEFAULT_LABEL_COLUMN, DEFAULT_SEED, DEFAULT_SYNTHETIC_ROWS};
use crate::sweep::cache::DEFAULT_MAX_ENTRIES;
use crate::sweep::{HyperparameterConfig, DEFAULT_RETRIES};

/// Default number of fits in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// A grid could not be parsed.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for a sweep run.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    // Execution settings
    /// Maximum number of fits in flight.
    pub concurrency: usize,

    // Label settings
    /// Name of the label column.
    pub label_column: String,
    /// Class kept as-is by the binarizer.
    pub reference_class: i64,
    /// Class every other label is mapped to.
    pub positive_class: i64,

    // Middleware settings
    /// Extra attempts for a retryable fit failure.
    pub retries: u32,
    /// Whether fitted models are memoized.
    pub cache_enabled: bool,
    /// Version folded into every cache key.
    pub cache_version: String,
    /// Upper bound on memoized models.
    pub cache_max_entries: usize,

    // Data settings
    /// CSV file to load; the synthetic generator is used when unset.
    pub data_path: Option<PathBuf>,
    /// Seed for the synthetic generator.
    pub seed: u64,
    /// Row count for the synthetic generator.
    pub synthetic_rows: usize,
    /// Built-in schema loaded data must conform to, by name.
    pub schema: Option<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,

            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            reference_class: 0,
            positive_class: 1,

            retries: DEFAULT_RETRIES,
            cache_enabled: true,
            cache_version: "1".to_string(),
            cache_max_entries: DEFAULT_MAX_ENTRIES,

            data_path: None,
            seed: DEFAULT_SEED,
            synthetic_rows: DEFAULT_SYNTHETIC_ROWS,
            schema: None,
        }
    }
}

impl SweepConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SWEEP_CONCURRENCY`: Maximum fits in flight (default: 5)
    /// - `SWEEP_LABEL_COLUMN`: Label column name (default: target)
    /// - `SWEEP_REFERENCE_CLASS`: Class kept by the binarizer (default: 0)
    /// - `SWEEP_POSITIVE_CLASS`: Class every other label becomes (default: 1)
    /// - `SWEEP_RETRIES`: Retries per failed fit (default: 3)
    /// - `SWEEP_CACHE_ENABLED`: Memoize fitted models (default: true)
    /// - `SWEEP_CACHE_VERSION`: Cache version (default: 1)
    /// - `SWEEP_CACHE_MAX_ENTRIES`: Cache capacity (default: 1024)
    /// - `SWEEP_DATA_PATH`: CSV dataset path (default: synthetic data)
    /// - `SWEEP_SEED`: Synthetic data seed (default: 42)
    /// - `SWEEP_SCHEMA`: Built-in schema to enforce, e.g. `wine` (default: none)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("SWEEP_CONCURRENCY") {
            config.concurrency = parse_env_value(&val, "SWEEP_CONCURRENCY")?;
        }

        if let Some(val) = lookup("SWEEP_LABEL_COLUMN") {
            config.label_column = val;
        }

        if let Some(val) = lookup("SWEEP_REFERENCE_CLASS") {
            config.reference_class = parse_env_value(&val, "SWEEP_REFERENCE_CLASS")?;
        }

        if let Some(val) = lookup("SWEEP_POSITIVE_CLASS") {
            config.positive_class = parse_env_value(&val, "SWEEP_POSITIVE_CLASS")?;
        }

        if let Some(val) = lookup("SWEEP_RETRIES") {
            config.retries = parse_env_value(&val, "SWEEP_RETRIES")?;
        }

        if let Some(val) = lookup("SWEEP_CACHE_ENABLED") {
            config.cache_enabled = parse_env_bool(&val, "SWEEP_CACHE_ENABLED")?;
        }

        if let Some(val) = lookup("SWEEP_CACHE_VERSION") {
            config.cache_version = val;
        }

        if let Some(val) = lookup("SWEEP_CACHE_MAX_ENTRIES") {
            config.cache_max_entries = parse_env_value(&val, "SWEEP_CACHE_MAX_ENTRIES")?;
        }

        if let Some(val) = lookup("SWEEP_DATA_PATH") {
            if !val.trim().is_empty() {
                config.data_path = Some(PathBuf::from(val));
            }
        }

        if let Some(val) = lookup("SWEEP_SEED") {
            config.seed = parse_env_value(&val, "SWEEP_SEED")?;
        }

        if let Some(val) = lookup("SWEEP_SCHEMA") {
            if !val.trim().is_empty() {
                config.schema = Some(val.trim().to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.label_column.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "label_column cannot be empty".to_string(),
            ));
        }

        if self.reference_class == self.positive_class {
            return Err(ConfigError::ValidationFailed(
                "reference_class and positive_class must differ".to_string(),
            ));
        }

        if self.cache_enabled && self.cache_version.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "cache_version cannot be empty".to_string(),
            ));
        }

        if self.cache_enabled && self.cache_max_entries == 0 {
            return Err(ConfigError::ValidationFailed(
                "cache_max_entries must be greater than 0".to_string(),
            ));
        }

        if let Some(name) = &self.schema {
            if DatasetSchema::named(name, &self.label_column).is_none() {
                return Err(ConfigError::ValidationFailed(format!(
                    "unknown schema '{}'",
                    name
                )));
            }
        }

        if self.data_path.is_none() && self.synthetic_rows < 3 {
            return Err(ConfigError::ValidationFailed(
                "synthetic_rows must be at least 3".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder method to set the label column.
    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    /// Builder method to set the binarizer classes.
    pub fn with_classes(mut self, reference: i64, positive: i64) -> Self {
        self.reference_class = reference;
        self.positive_class = positive;
        self
    }

    /// Builder method to set the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Builder method to enable or disable the model cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Builder method to set the cache version.
    pub fn with_cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = version.into();
        self
    }

    /// Builder method to set the cache capacity.
    pub fn with_cache_max_entries(mut self, max: usize) -> Self {
        self.cache_max_entries = max;
        self
    }

    /// Builder method to load data from a CSV file.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Builder method to set the synthetic data seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to set the synthetic row count.
    pub fn with_synthetic_rows(mut self, rows: usize) -> Self {
        self.synthetic_rows = rows;
        self
    }

    /// Builder method to enforce a built-in schema on loaded data.
    pub fn with_schema(mut self, name: impl Into<String>) -> Self {
        self.schema = Some(name.into());
        self
    }

    /// Resolves the configured schema name.
    pub fn dataset_schema(&self) -> Option<DatasetSchema> {
        self.schema
            .as_deref()
            .and_then(|name| DatasetSchema::named(name, &self.label_column))
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

/// Parses a grid from JSON or YAML text.
///
/// Accepts a list of objects (`[{"C": 0.1}, {"C": 0.01}]`) or a single
/// object, which becomes a grid of one. JSON is tried first so that its
/// error messages win for JSON-looking input.
pub fn parse_grid(text: &str) -> Result<Vec<HyperparameterConfig>, ConfigError> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(json_err) => serde_yaml::from_str(text).map_err(|yaml_err| {
            let looks_like_json = text.trim_start().starts_with(['[', '{']);
            ConfigError::InvalidGrid(if looks_like_json {
                json_err.to_string()
            } else {
                yaml_err.to_string()
            })
        })?,
    };

    match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).map_err(|e| ConfigError::InvalidGrid(e.to_string()))
        }
        serde_json::Value::Object(_) => serde_json::from_value(value)
            .map(|entry| vec![entry])
            .map_err(|e| ConfigError::InvalidGrid(e.to_string())),
        other => Err(ConfigError::InvalidGrid(format!(
            "expected a list of parameter maps, got {}",
            other
        ))),
    }
}

/// Reads a grid from a JSON or YAML file.
pub async fn load_grid_file(path: &Path) -> Result<Vec<HyperparameterConfig>, ConfigError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_grid(&text).map_err(|e| match e {
        ConfigError::InvalidGrid(msg) => {
            ConfigError::InvalidGrid(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Resolves a grid argument that is either inline JSON/YAML or a file path.
pub async fn resolve_grid(source: &str) -> Result<Vec<HyperparameterConfig>, ConfigError> {
    let trimmed = source.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return parse_grid(source);
    }
    load_grid_file(Path::new(source)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.label_column, "target");
        assert_eq!(config.reference_class, 0);
        assert_eq!(config.positive_class, 1);
        assert_eq!(config.retries, 3);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_version, "1");
        assert!(config.data_path.is_none());
        assert_eq!(config.seed, 42);
        assert_eq!(config.synthetic_rows, 178);
        assert!(config.schema.is_none());
        assert!(config.dataset_schema().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SweepConfig::new()
            .with_concurrency(8)
            .with_label_column("quality")
            .with_classes(2, 9)
            .with_retries(0)
            .with_cache(false)
            .with_cache_version("7")
            .with_data_path("wine.csv")
            .with_seed(1)
            .with_synthetic_rows(50);

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.label_column, "quality");
        assert_eq!((config.reference_class, config.positive_class), (2, 9));
        assert_eq!(config.retries, 0);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_version, "7");
        assert_eq!(config.data_path, Some(PathBuf::from("wine.csv")));
        assert_eq!(config.seed, 1);
        assert_eq!(config.synthetic_rows, 50);
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = SweepConfig::from_lookup(lookup(&[
            ("SWEEP_CONCURRENCY", "2"),
            ("SWEEP_LABEL_COLUMN", "class"),
            ("SWEEP_REFERENCE_CLASS", "3"),
            ("SWEEP_POSITIVE_CLASS", "4"),
            ("SWEEP_RETRIES", "1"),
            ("SWEEP_CACHE_ENABLED", "off"),
            ("SWEEP_CACHE_VERSION", "v2"),
            ("SWEEP_CACHE_MAX_ENTRIES", "16"),
            ("SWEEP_DATA_PATH", "/data/wine.csv"),
            ("SWEEP_SEED", "7"),
            ("SWEEP_SCHEMA", "wine"),
        ]))
        .unwrap();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.label_column, "class");
        assert_eq!(config.reference_class, 3);
        assert_eq!(config.positive_class, 4);
        assert_eq!(config.retries, 1);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_version, "v2");
        assert_eq!(config.cache_max_entries, 16);
        assert_eq!(config.data_path, Some(PathBuf::from("/data/wine.csv")));
        assert_eq!(config.seed, 7);
        assert_eq!(config.schema.as_deref(), Some("wine"));
        assert_eq!(config.dataset_schema().unwrap().label_column, "class");
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = SweepConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = SweepConfig::from_lookup(lookup(&[("SWEEP_CONCURRENCY", "many")])).unwrap_err();
        assert!(err.to_string().contains("SWEEP_CONCURRENCY"));

        let err = SweepConfig::from_lookup(lookup(&[("SWEEP_CONCURRENCY", "0")])).unwrap_err();
        assert!(err.to_string().contains("concurrency"));

        let err =
            SweepConfig::from_lookup(lookup(&[("SWEEP_CACHE_ENABLED", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            (SweepConfig::default().with_concurrency(0), "concurrency"),
            (SweepConfig::default().with_label_column(" "), "label_column"),
            (SweepConfig::default().with_classes(1, 1), "must differ"),
            (SweepConfig::default().with_cache_version(""), "cache_version"),
            (SweepConfig::default().with_cache_max_entries(0), "cache_max_entries"),
            (SweepConfig::default().with_synthetic_rows(2), "synthetic_rows"),
            (SweepConfig::default().with_schema("iris"), "unknown schema"),
        ];
        for (config, needle) in cases {
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(needle), "{err} missing {needle}");
        }

        // Cache settings are irrelevant when the cache is off.
        assert!(SweepConfig::default()
            .with_cache(false)
            .with_cache_version("")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("true", "test").unwrap());
        assert!(parse_env_bool("1", "test").unwrap());
        assert!(parse_env_bool("YES", "test").unwrap());
        assert!(parse_env_bool(" on ", "test").unwrap());
        assert!(!parse_env_bool("false", "test").unwrap());
        assert!(!parse_env_bool("0", "test").unwrap());
        assert!(!parse_env_bool("off", "test").unwrap());
        assert!(parse_env_bool("invalid", "test").is_err());
    }

    #[test]
    fn test_parse_grid_json_and_yaml() {
        let grid = parse_grid(r#"[{"C": 0.1}, {"C": 0.01, "max_iter": 1000}]"#).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[1].get("max_iter"), Some(&json!(1000)));

        let grid = parse_grid("- C: 0.1\n  penalty: l2\n- C: 0.001\n").unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].get("penalty"), Some(&json!("l2")));
        assert_eq!(grid[1].get("C"), Some(&json!(0.001)));

        let single = parse_grid(r#"{"C": 1.0}"#).unwrap();
        assert_eq!(single.len(), 1);

        assert!(parse_grid("[]").unwrap().is_empty());
        assert!(matches!(parse_grid("42"), Err(ConfigError::InvalidGrid(_))));
        assert!(matches!(parse_grid("[1, 2]"), Err(ConfigError::InvalidGrid(_))));
    }

    #[tokio::test]
    async fn test_resolve_grid_from_file_and_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.yaml");
        tokio::fs::write(&path, "- C: 0.5\n- C: 0.25\n").await.unwrap();

        let from_file = resolve_grid(path.to_str().unwrap()).await.unwrap();
        assert_eq!(from_file.len(), 2);

        let inline = resolve_grid(r#"[{"C": 0.5}]"#).await.unwrap();
        assert_eq!(inline.len(), 1);

        let missing = resolve_grid("/definitely/not/here.json").await;
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "KEY".to_string(),
            message: "bad value".to_string(),
        };
        assert!(err.to_string().contains("KEY"));
        assert!(err.to_string().contains("bad value"));

        let err = ConfigError::ValidationFailed("test failure".to_string());
        assert!(err.to_string().contains("test failure"));
    }
}
