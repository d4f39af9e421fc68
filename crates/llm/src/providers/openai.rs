//! OpenAI-compatible chat completions provider.
//!
//! Works against any endpoint that implements `POST /chat/completions`
//! with bearer authentication: OpenAI itself and Groq
//! (`https://api.groq.com/openai/v1`).

use super::{http_client, send_error, status_error, DEFAULT_TIMEOUT_SECS};
use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docqa_core::{AppError, AppResult, BackendErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Chat completions request/response types ────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    provider: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for `provider` ("openai", "groq") at `base_url`.
    ///
    /// A missing key is accepted here and reported on first use, so the
    /// health monitor can describe the problem instead of startup failing.
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> AppResult<Self> {
        Self::with_timeout(
            provider,
            base_url,
            api_key,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Same as [`OpenAiClient::new`] with an explicit request timeout.
    pub fn with_timeout(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        Ok(Self {
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: http_client(timeout)?,
        })
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AppError::backend(BackendErrorKind::Auth, "API key not configured")
        })
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn convert_response(&self, response: ChatResponse, model: &str) -> AppResult<LlmResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::Synthesis(format!("{} response contained no choices", self.provider))
            })?;

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: if response.model.is_empty() {
                model.to_string()
            } else {
                response.model
            },
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        tracing::info!(provider = %self.provider, model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.to_chat_request(request))
            .send()
            .await
            .map_err(|e| send_error(&self.provider, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(&self.provider, status, &body));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::Synthesis(format!("Failed to parse {} response: {}", self.provider, e))
        })?;

        let converted = self.convert_response(chat, &request.model)?;

        tracing::info!(
            provider = %self.provider,
            completion_tokens = converted.usage.completion_tokens,
            "Received chat completion"
        );

        Ok(converted)
    }

    async fn health_check(&self) -> AppResult<()> {
        let api_key = self.api_key()?;
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| send_error(&self.provider, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(status_error(
                &self.provider,
                status,
                &format!("status {}", status.as_u16()),
            ))
        }
    }
}
