//! Embedding configuration types.

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding configuration for the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Endpoint for network providers, provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Identifier of the embedding space: `provider/model/dimensions`.
    ///
    /// Vectors produced under different fingerprints are not comparable.
    pub fn fingerprint(&self) -> String {
        format!("{}/{}/{}", self.provider, self.model, self.dimensions)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch_size must be greater than zero".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config(
                "Embedding model cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert!(config.normalize);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.fingerprint(), "trigram/trigram-v1/384");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EmbeddingConfig = serde_yaml::from_str("dimensions: 128\n").unwrap();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.dimensions, 128);
        assert_eq!(config.fingerprint(), "trigram/trigram-v1/128");
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = EmbeddingConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
