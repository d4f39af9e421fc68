//! Grounded answer synthesis.

use crate::config::SynthesisConfig;
use crate::retriever::Retriever;
use crate::types::{Answer, Citation, RetrievalResult};
use docqa_core::{AppError, AppResult, BackendErrorKind};
use docqa_llm::{LlmClient, LlmRequest, LlmResponse};
use docqa_prompt::{build_prompt, PromptDefinition, PromptInput, PromptSource};
use std::sync::Arc;
use std::time::Duration;

/// Backend attempts per question: the first call plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// Turns a question plus retrieved passages into a cited answer.
pub struct Synthesizer {
    retriever: Retriever,
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    top_k: usize,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        model: impl Into<String>,
        top_k: usize,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            prompt,
            model: model.into(),
            top_k,
            config,
        }
    }

    /// Answer `question` from the corpus.
    ///
    /// The backend is only called when at least one relevant passage exists.
    /// Citations keep retrieval order and scores.
    pub async fn answer(&self, question: &str) -> AppResult<Answer> {
        let results = self.retriever.retrieve(question, self.top_k).await?;
        if results.is_empty() {
            return Err(AppError::NoRelevantContent);
        }

        let request = self.build_request(question.trim(), &results)?;
        let response = self.complete_with_retry(&request).await?;

        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(AppError::Synthesis(
                "Backend returned an empty answer".to_string(),
            ));
        }

        tracing::info!(
            sources = results.len(),
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Answer synthesized"
        );

        Ok(Answer {
            answer: answer.to_string(),
            sources: results.iter().map(Citation::from).collect(),
        })
    }

    fn build_request(&self, question: &str, results: &[RetrievalResult]) -> AppResult<LlmRequest> {
        let input = PromptInput {
            question: question.to_string(),
            sources: results
                .iter()
                .map(|r| PromptSource {
                    filename: r.filename.clone(),
                    chunk_index: r.chunk.chunk_index,
                    text: r.chunk.text.clone(),
                })
                .collect(),
        };
        let built = build_prompt(&self.prompt, &input)?;

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        Ok(request)
    }

    async fn complete_with_retry(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let attempt_timeout = Duration::from_secs(self.config.timeout_secs);
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(attempt_timeout, self.llm.complete(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::backend(
                    BackendErrorKind::Timeout,
                    format!(
                        "{} did not answer within {}s",
                        self.llm.provider_name(),
                        attempt_timeout.as_secs()
                    ),
                )),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        backoff_ms = self.config.retry_backoff_ms,
                        "Backend call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
