//! Shared fixtures and cross-component tests.


use crate::chunker::sha256_hex;
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::index::{MemoryIndex, VectorIndex};
use crate::retriever::Retriever;
use crate::store::DocumentStore;
use crate::types::{ChunkSpan, NewChunk, NewDocument};
use docqa_core::{AppError, AppResult, BackendErrorKind};
use docqa_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const TEST_DIMS: usize = 384;
pub(crate) const TEST_FINGERPRINT: &str = "trigram/trigram-v1/384";

/// Backend that replays a fixed list of completion results.
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<AppResult<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    health_error: Option<(BackendErrorKind, String)>,
}

impl ScriptedClient {
    pub(crate) fn new(responses: Vec<AppResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            health_error: None,
        }
    }

    /// Sleep before every completion and health probe.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_health_error(mut self, kind: BackendErrorKind, message: &str) -> Self {
        self.health_error = Some((kind, message.to_string()));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
            }),
            Some(Err(e)) => Err(e),
            None => Err(AppError::Synthesis("Script exhausted".to_string())),
        }
    }

    async fn health_check(&self) -> AppResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.health_error {
            Some((kind, message)) => Err(AppError::backend(*kind, message.clone())),
            None => Ok(()),
        }
    }
}

/// Retriever over an in-memory corpus holding only `sky.txt`.
pub(crate) async fn sky_corpus() -> Retriever {
    let store = Arc::new(DocumentStore::open_in_memory().unwrap());
    let index = Arc::new(MemoryIndex::new(TEST_FINGERPRINT, TEST_DIMS));
    let embedder = Arc::new(TrigramProvider::new(TEST_DIMS));

    let text = "The sky is blue. Grass is green.";
    let document = store
        .create(NewDocument {
            filename: "sky.txt".to_string(),
            content_hash: sha256_hex(text),
            size_bytes: text.len() as u64,
            chunks: vec![NewChunk {
                span: ChunkSpan {
                    index: 0,
                    text: text.to_string(),
                    byte_range: 0..text.len(),
                    hash: sha256_hex(text),
                },
                embedding: embedder.embed(text).await.unwrap(),
            }],
        })
        .unwrap();

    index
        .add_document(
            &document.id,
            document
                .chunks
                .iter()
                .map(|c| (c.id.clone(), c.embedding.clone()))
                .collect(),
        )
        .unwrap();

    Retriever::new(store, index, embedder, TEST_FINGERPRINT)
}
