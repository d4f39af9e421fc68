//! LLM provider factory.
//!
//! This module creates LLM clients from a provider name plus the resolved
//! endpoint, API key and timeout.

use crate::client::LlmClient;
use crate::providers::{ExtractiveClient, OllamaClient, OpenAiClient, DEFAULT_TIMEOUT_SECS};
use crate::types::ProviderType;
use docqa_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Resolved settings for building a client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Custom endpoint URL, provider default when `None`
    pub endpoint: Option<String>,

    /// API key for providers that require one
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Sentence budget for the extractive provider
    pub max_sentences: Option<usize>,
}

/// Create an LLM client based on the provider name.
///
/// Network providers that need an API key are still created without one; the
/// missing key surfaces as an authentication failure on first use and in the
/// health report.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(provider: &str, options: &ClientOptions) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    let timeout = Duration::from_secs(options.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let endpoint = options
        .endpoint
        .clone()
        .or_else(|| provider_type.default_endpoint().map(str::to_string));

    tracing::debug!(
        provider = provider_type.as_str(),
        endpoint = ?endpoint,
        timeout_secs = timeout.as_secs(),
        "Creating LLM client"
    );

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => Arc::new(OllamaClient::with_timeout(
            endpoint.unwrap_or_default(),
            timeout,
        )?),
        ProviderType::OpenAI | ProviderType::Groq => {
            if provider_type.requires_api_key() && options.api_key.is_none() {
                tracing::warn!("No API key configured for provider '{}'", provider);
            }
            Arc::new(OpenAiClient::with_timeout(
                provider_type.as_str(),
                endpoint.unwrap_or_default(),
                options.api_key.clone(),
                timeout,
            )?)
        }
        ProviderType::Extractive => Arc::new(match options.max_sentences {
            Some(n) => ExtractiveClient::with_max_sentences(n),
            None => ExtractiveClient::new(),
        }),
    };

    Ok(client)
}
