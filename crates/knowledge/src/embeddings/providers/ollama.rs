//! Ollama embedding provider.
//!
//! Calls `/api/embeddings` once per text. Transport failures and 5xx/429
//! responses are retried with exponential backoff; any other failure is
//! returned immediately.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use docqa_core::{AppError, AppResult, BackendErrorKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Maximum attempts per text
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ollama embedding provider using the local API.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider from configuration.
    ///
    /// The endpoint comes from `config.endpoint`, then `OLLAMA_URL`, then the
    /// local default. No request is made until the first embedding.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    /// Embed single text with retry logic.
    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 0;

        loop {
            match self.embed_single(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                    attempt += 1;
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, MAX_RETRIES, backoff_ms, e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Embed single text (no retries).
    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    BackendErrorKind::Timeout
                } else {
                    BackendErrorKind::Unavailable
                };
                AppError::backend(kind, format!("Ollama embedding request failed: {}", e))
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let detail = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);

            let kind = if status.is_server_error() {
                BackendErrorKind::Unavailable
            } else if status.as_u16() == 429 {
                BackendErrorKind::RateLimited
            } else {
                return Err(AppError::Storage(format!(
                    "Ollama embedding error ({}): {}",
                    status, detail
                )));
            };
            return Err(AppError::backend(
                kind,
                format!("Ollama embedding error ({}): {}", status, detail),
            ));
        }

        let response_body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::Storage(format!("Failed to parse Ollama embedding response: {}", e))
        })?;

        if response_body.embedding.len() != self.dimensions {
            return Err(AppError::Storage(format!(
                "Ollama model '{}' returned {} dimensions, expected {}",
                self.model,
                response_body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(response_body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        // The embeddings endpoint takes one prompt per request.
        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                warn!("Empty text at index {}, using zero vector", i);
                embeddings.push(vec![0.0; self.dimensions]);
                continue;
            }

            embeddings.push(self.embed_with_retries(text).await?);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(endpoint: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: Some(endpoint.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_from_config() {
        let provider = OllamaProvider::new(&create_test_config("http://embed.local:11434/")).unwrap();
        assert_eq!(provider.base_url, "http://embed.local:11434");
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }

    #[tokio::test]
    async fn test_empty_text_gets_zero_vector_without_request() {
        let provider = OllamaProvider::new(&create_test_config("http://127.0.0.1:9")).unwrap();
        let embeddings = provider.embed_batch(&["  ".to_string()]).await.unwrap();
        assert_eq!(embeddings[0], vec![0.0; 768]);
    }

    #[tokio::test]
    async fn test_unreachable_is_backend_unavailable() {
        let provider = OllamaProvider::new(&create_test_config("http://127.0.0.1:9")).unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert_eq!(err.kind(), docqa_core::ErrorKind::BackendUnavailable);
    }
}
