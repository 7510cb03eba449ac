//! Configuration loading, validation, and management for Engram.
//!
//! Loads configuration from `~/.engram/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use engram_core::SourceWeights;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.engram/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context assembly settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Experience clustering settings
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Value validation and storage settings
    #[serde(default)]
    pub values: ValuesConfig,

    /// Vector store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding model
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Budget weight per source category
    #[serde(default)]
    pub weights: SourceWeights,

    /// Largest share of a category budget a single item may take
    #[serde(default = "default_max_item_fraction")]
    pub max_item_fraction: f64,

    /// Text similarity at or above which two items are duplicates
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Characters of each item compared during deduplication
    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,

    #[serde(default = "default_max_tokens_limit")]
    pub max_tokens_limit: usize,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,

    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Per-source fetch timeout; a slow source contributes nothing
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
}

fn default_max_item_fraction() -> f64 {
    0.25
}
fn default_similarity_threshold() -> f64 {
    0.90
}
fn default_dedup_prefix_chars() -> usize {
    1000
}
fn default_max_tokens_limit() -> usize {
    100_000
}
fn default_max_tokens() -> usize {
    2000
}
fn default_limit() -> usize {
    20
}
fn default_max_limit() -> usize {
    100
}
fn default_source_timeout_ms() -> u64 {
    5_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            weights: SourceWeights::default(),
            max_item_fraction: default_max_item_fraction(),
            similarity_threshold: default_similarity_threshold(),
            dedup_prefix_chars: default_dedup_prefix_chars(),
            max_tokens_limit: default_max_tokens_limit(),
            default_max_tokens: default_max_tokens(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            source_timeout_ms: default_source_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// "eom" (excess of mass) or "leaf"
    #[serde(default = "default_selection_method")]
    pub selection_method: String,

    /// Maximum experiences read per axis
    #[serde(default = "default_scroll_limit")]
    pub scroll_limit: usize,
}

fn default_min_cluster_size() -> usize {
    5
}
fn default_min_samples() -> usize {
    3
}
fn default_selection_method() -> String {
    "eom".into()
}
fn default_scroll_limit() -> usize {
    10_000
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            min_samples: default_min_samples(),
            selection_method: default_selection_method(),
            scroll_limit: default_scroll_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuesConfig {
    /// Experiences an axis needs before its clusters are trusted
    #[serde(default = "default_min_experiences")]
    pub min_experiences: usize,

    /// threshold = mean + std_multiplier * std
    #[serde(default = "default_std_multiplier")]
    pub std_multiplier: f64,

    #[serde(default = "default_list_limit")]
    pub list_limit: usize,

    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,

    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
}

fn default_min_experiences() -> usize {
    20
}
fn default_std_multiplier() -> f64 {
    0.5
}
fn default_list_limit() -> usize {
    1000
}
fn default_embedding_timeout_ms() -> u64 {
    10_000
}
fn default_storage_timeout_ms() -> u64 {
    10_000
}

impl Default for ValuesConfig {
    fn default() -> Self {
        Self {
            min_experiences: default_min_experiences(),
            std_multiplier: default_std_multiplier(),
            list_limit: default_list_limit(),
            embedding_timeout_ms: default_embedding_timeout_ms(),
            storage_timeout_ms: default_storage_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "file"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Snapshot file for the "file" backend
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_backend() -> String {
    "file".into()
}
fn default_storage_path() -> PathBuf {
    AppConfig::config_dir().join("store.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Only "hash" ships in-tree
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

fn default_embedding_provider() -> String {
    "hash".into()
}
fn default_embedding_dimension() -> usize {
    768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.engram/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `ENGRAM_STORAGE_PATH`
    /// - `ENGRAM_EMBEDDING_DIMENSION`
    /// - `ENGRAM_MIN_EXPERIENCES`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ENGRAM_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Some(dim) = lookup("ENGRAM_EMBEDDING_DIMENSION") {
            self.embedding.dimension = dim.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "ENGRAM_EMBEDDING_DIMENSION must be a positive integer, got '{dim}'"
                ))
            })?;
        }

        if let Some(min) = lookup("ENGRAM_MIN_EXPERIENCES") {
            self.values.min_experiences = min.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "ENGRAM_MIN_EXPERIENCES must be a non-negative integer, got '{min}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".engram")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.context.weights;
        if [w.memories, w.code, w.experiences, w.values, w.commits]
            .iter()
            .any(|&x| x == 0)
        {
            return Err(ConfigError::ValidationError(
                "context.weights must all be > 0".into(),
            ));
        }

        if !(self.context.max_item_fraction > 0.0 && self.context.max_item_fraction <= 1.0) {
            return Err(ConfigError::ValidationError(
                "context.max_item_fraction must be in (0, 1]".into(),
            ));
        }

        if !(self.context.similarity_threshold > 0.0 && self.context.similarity_threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "context.similarity_threshold must be in (0, 1]".into(),
            ));
        }

        if self.context.dedup_prefix_chars == 0 {
            return Err(ConfigError::ValidationError(
                "context.dedup_prefix_chars must be > 0".into(),
            ));
        }

        if self.context.max_limit == 0
            || self.context.default_limit == 0
            || self.context.default_limit > self.context.max_limit
        {
            return Err(ConfigError::ValidationError(
                "context.default_limit must be in 1..=context.max_limit".into(),
            ));
        }

        if self.context.default_max_tokens > self.context.max_tokens_limit {
            return Err(ConfigError::ValidationError(
                "context.default_max_tokens must not exceed context.max_tokens_limit".into(),
            ));
        }

        if self.clustering.min_cluster_size < 2 {
            return Err(ConfigError::ValidationError(
                "clustering.min_cluster_size must be >= 2".into(),
            ));
        }

        if self.clustering.min_samples == 0
            || self.clustering.min_samples > self.clustering.min_cluster_size
        {
            return Err(ConfigError::ValidationError(
                "clustering.min_samples must be in 1..=min_cluster_size".into(),
            ));
        }

        if !matches!(self.clustering.selection_method.as_str(), "eom" | "leaf") {
            return Err(ConfigError::ValidationError(format!(
                "clustering.selection_method must be 'eom' or 'leaf', got '{}'",
                self.clustering.selection_method
            )));
        }

        if self.values.std_multiplier < 0.0 {
            return Err(ConfigError::ValidationError(
                "values.std_multiplier must be >= 0".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be 'memory' or 'file', got '{}'",
                self.storage.backend
            )));
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for engram_core::Error {
    fn from(e: ConfigError) -> Self {
        engram_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.max_item_fraction, 0.25);
        assert_eq!(config.clustering.min_cluster_size, 5);
        assert_eq!(config.values.min_experiences, 20);
        assert_eq!(config.context.weights.experiences, 3);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.context.default_limit, config.context.default_limit);
        assert_eq!(parsed.embedding.dimension, config.embedding.dimension);
        assert_eq!(parsed.context.weights, config.context.weights);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
            [context.weights]
            code = 5

            [clustering]
            selection_method = "leaf"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.context.weights.code, 5);
        assert_eq!(config.context.weights.memories, 1);
        assert_eq!(config.clustering.selection_method, "leaf");
        assert_eq!(config.clustering.min_samples, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_weight_rejected() {
        let mut config = AppConfig::default();
        config.context.weights.values = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inconsistent_clustering_rejected() {
        let mut config = AppConfig::default();
        config.clustering.min_samples = 6;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.clustering.selection_method = "dbscan".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn fraction_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.context.max_item_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.embedding.provider, "hash");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[values]\nmin_experiences = 40\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.values.min_experiences, 40);
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[values\nmin_experiences = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("ENGRAM_STORAGE_PATH", "/data/engram.json"),
            ("ENGRAM_EMBEDDING_DIMENSION", "384"),
            ("ENGRAM_MIN_EXPERIENCES", "10"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/data/engram.json"));
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.values.min_experiences, 10);
    }

    #[test]
    fn malformed_override_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|k| (k == "ENGRAM_EMBEDDING_DIMENSION").then(|| "wide".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("wide"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_item_fraction"));
        assert!(toml_str.contains("eom"));
    }
}
