//! Knowledge configuration management.

use crate::embeddings::EmbeddingConfig;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for chunking, retrieval, synthesis and health monitoring.
///
/// Stored at `<data_dir>/knowledge/config.yaml`; every field is optional in
/// the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of passages retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Passages scoring at or below this are never cited
    #[serde(default)]
    pub min_relevance: f32,

    /// Reject uploads whose filename is already taken
    #[serde(default)]
    pub unique_filenames: bool,

    /// Prompt definition used for answers
    #[serde(default = "default_prompt_id")]
    pub prompt_id: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub health: HealthConfig,
}

/// Backend call parameters for answer synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on a single backend attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay before the single retry of a retryable failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Health probing parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthConfig {
    /// Interval between scheduled checks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on each component probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    64
}

fn default_top_k() -> usize {
    3
}

fn default_prompt_id() -> String {
    docqa_prompt::DEFAULT_PROMPT_ID.to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    10
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            min_relevance: 0.0,
            unique_filenames: false,
            prompt_id: default_prompt_id(),
            embedding: EmbeddingConfig::default(),
            synthesis: SynthesisConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl KnowledgeConfig {
    /// Reject settings no component can work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.min_relevance) {
            return Err(AppError::Config(format!(
                "min_relevance must be in [0, 1), got {}",
                self.min_relevance
            )));
        }
        if self.synthesis.timeout_secs == 0 || self.health.probe_timeout_secs == 0 {
            return Err(AppError::Config(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if self.health.interval_secs == 0 {
            return Err(AppError::Config(
                "health.interval_secs must be greater than zero".to_string(),
            ));
        }
        self.embedding.validate()
    }
}

/// Load knowledge configuration.
///
/// Loads from `<data_dir>/knowledge/config.yaml` if it exists, otherwise
/// returns defaults.
pub fn load_config(data_dir: &Path) -> AppResult<KnowledgeConfig> {
    let config_path = get_config_path(data_dir);

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: KnowledgeConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!("Loaded knowledge config from {:?}", config_path);
        config
    } else {
        tracing::debug!("Using default knowledge config (no config file found)");
        KnowledgeConfig::default()
    };

    config.validate()?;
    Ok(config)
}

/// Save knowledge configuration.
pub fn save_config(data_dir: &Path, config: &KnowledgeConfig) -> AppResult<()> {
    let config_path = get_config_path(data_dir);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml)?;

    tracing::debug!("Saved knowledge config to {:?}", config_path);
    Ok(())
}

/// Get the knowledge directory.
pub fn get_knowledge_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("knowledge")
}

/// Get the path to the knowledge config file.
pub fn get_config_path(data_dir: &Path) -> PathBuf {
    get_knowledge_dir(data_dir).join("config.yaml")
}

/// Get the SQLite store path.
pub fn get_store_path(data_dir: &Path) -> PathBuf {
    get_knowledge_dir(data_dir).join("store.sqlite")
}
