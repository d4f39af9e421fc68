//! Question-to-passage retrieval.

use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::store::DocumentStore;
use crate::types::RetrievalResult;
use docqa_core::{AppError, AppResult};
use std::sync::Arc;

/// Finds the passages most relevant to a question.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<DocumentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    fingerprint: String,
    min_relevance: f32,
}

impl Retriever {
    /// `fingerprint` names the embedding space of `embedder`; it must match
    /// the index's fingerprint for queries to be answered.
    pub fn new(
        store: Arc<DocumentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            fingerprint: fingerprint.into(),
            min_relevance: 0.0,
        }
    }

    /// Results scoring at or below `min_relevance` are dropped.
    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    /// Up to `k` passages in non-increasing relevance order.
    ///
    /// # Errors
    /// - `Validation` for an empty question
    /// - `NoDocuments` when nothing has been uploaded
    /// - `Storage` when the index belongs to another embedding space
    pub async fn retrieve(&self, question: &str, k: usize) -> AppResult<Vec<RetrievalResult>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }

        if self.index.is_empty() && self.store.document_count()? == 0 {
            return Err(AppError::NoDocuments);
        }

        if self.index.fingerprint() != self.fingerprint {
            return Err(AppError::Storage(format!(
                "Index was built with embeddings '{}' but queries use '{}'",
                self.index.fingerprint(),
                self.fingerprint
            )));
        }

        let query_vector = self.embedder.embed(question).await?;
        let hits = self.index.query(&query_vector, k)?;

        let relevant: Vec<(String, f32)> = hits
            .into_iter()
            .filter(|(_, score)| *score > self.min_relevance)
            .collect();

        tracing::debug!(
            requested = k,
            relevant = relevant.len(),
            top_score = relevant.first().map(|(_, s)| *s).unwrap_or(0.0),
            "Queried index"
        );

        if relevant.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = relevant.iter().map(|(id, _)| id.clone()).collect();
        let mut resolved = self.store.chunks_by_ids(&ids)?.into_iter().peekable();

        // chunks_by_ids keeps input order and only skips vanished ids.
        let mut results = Vec::with_capacity(relevant.len());
        for (id, score) in relevant {
            if resolved.peek().map(|r| r.chunk.id == id).unwrap_or(false) {
                if let Some(chunk_ref) = resolved.next() {
                    results.push(RetrievalResult {
                        chunk: chunk_ref.chunk,
                        filename: chunk_ref.filename,
                        relevance: score,
                    });
                }
            }
        }

        Ok(results)
    }
}
