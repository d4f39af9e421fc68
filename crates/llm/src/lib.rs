//! Language-model backend integration for docqa.
//!
//! This crate provides a provider-agnostic abstraction for the backend that
//! turns a grounded prompt into an answer. All providers share one trait and
//! report failures through the typed `AppError::BackendUnavailable` /
//! `AppError::Synthesis` variants.
//!
//! # Providers
//! - **OpenAI-compatible** chat completions (OpenAI, Groq)
//! - **Ollama**: local LLM runtime
//! - **Extractive**: offline, deterministic sentence selection
//!
//! # Example
//! ```no_run
//! use docqa_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new()?;
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, ClientOptions};
pub use providers::{ExtractiveClient, OllamaClient, OpenAiClient};
pub use types::ProviderType;
