//! Caller-facing facade over the knowledge components.

use crate::chunker::{chunk_text, sha256_hex};
use crate::config::{get_store_path, KnowledgeConfig};
use crate::embeddings::{create_provider, embed_texts, EmbeddingProvider};
use crate::health::{HealthMonitor, HealthReport, HealthScheduler};
use crate::index::{MemoryIndex, VectorIndex};
use crate::retriever::Retriever;
use crate::store::DocumentStore;
use crate::synthesizer::Synthesizer;
use crate::types::{
    Answer, Chunk, CorpusStats, DocumentSummary, NewChunk, NewDocument, UploadReceipt,
};
use docqa_core::{AppError, AppResult};
use docqa_llm::LlmClient;
use docqa_prompt::{load_prompt, PromptDefinition};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Upload, list, delete, ask and health over one corpus.
pub struct KnowledgeService {
    store: Arc<DocumentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    synthesizer: Synthesizer,
    monitor: Arc<HealthMonitor>,
    config: KnowledgeConfig,
    /// Serializes the store and index steps of upload and delete.
    writes: Mutex<()>,
}

impl KnowledgeService {
    /// Open the corpus stored under `data_dir`.
    ///
    /// Rebuilds the in-memory index from the store. Stored vectors from a
    /// different embedding space are re-embedded first.
    pub async fn open(
        data_dir: &Path,
        config: KnowledgeConfig,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> AppResult<Self> {
        config.validate()?;

        let store = DocumentStore::open(&get_store_path(data_dir))?;
        let prompt = load_prompt(data_dir, &config.prompt_id)?;
        let embedder = create_provider(&config.embedding)?;

        Self::with_parts(store, embedder, llm, prompt, model, config).await
    }

    /// Assemble a service from an already opened store and providers.
    pub async fn with_parts(
        store: DocumentStore,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        model: impl Into<String>,
        config: KnowledgeConfig,
    ) -> AppResult<Self> {
        let store = Arc::new(store.with_unique_filenames(config.unique_filenames));
        let fingerprint = config.embedding.fingerprint();

        reconcile_embeddings(&store, embedder.as_ref(), &fingerprint, config.embedding.batch_size)
            .await?;

        let index: Arc<dyn VectorIndex> =
            Arc::new(MemoryIndex::new(fingerprint.clone(), embedder.dimensions()));
        rebuild_index(index.as_ref(), store.all_chunks()?)?;

        tracing::info!(
            documents = index.document_count(),
            chunks = index.len(),
            embeddings = %fingerprint,
            "Knowledge service ready"
        );

        let retriever = Retriever::new(
            Arc::clone(&store),
            Arc::clone(&index),
            Arc::clone(&embedder),
            fingerprint,
        )
        .with_min_relevance(config.min_relevance);

        let synthesizer = Synthesizer::new(
            retriever,
            Arc::clone(&llm),
            prompt,
            model,
            config.top_k,
            config.synthesis.clone(),
        );

        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            llm,
            Duration::from_secs(config.health.probe_timeout_secs),
        ));

        Ok(Self {
            store,
            index,
            embedder,
            synthesizer,
            monitor,
            config,
            writes: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Ingest a plain-text document.
    ///
    /// All-or-nothing: on any failure no document, chunk or index entry
    /// remains.
    pub async fn upload(&self, filename: &str, content: &str) -> AppResult<UploadReceipt> {
        validate_filename(filename)?;
        if content.trim().is_empty() {
            return Err(AppError::Validation(format!("{} is empty", filename)));
        }

        let spans = chunk_text(content, self.config.chunk_size, self.config.chunk_overlap)?;
        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
        let embeddings =
            embed_texts(self.embedder.as_ref(), &texts, self.config.embedding.batch_size).await?;

        let new_document = NewDocument {
            filename: filename.to_string(),
            content_hash: sha256_hex(content),
            size_bytes: content.len() as u64,
            chunks: spans
                .into_iter()
                .zip(embeddings)
                .map(|(span, embedding)| NewChunk { span, embedding })
                .collect(),
        };

        let document = {
            let _writes = self.lock_writes();
            let document = self.store.create(new_document)?;

            let entries = document
                .chunks
                .iter()
                .map(|c| (c.id.clone(), c.embedding.clone()))
                .collect();
            if let Err(e) = self.index.add_document(&document.id, entries) {
                tracing::error!(document_id = %document.id, "Indexing failed, rolling back: {}", e);
                if let Err(rollback) = self.store.delete(&document.id) {
                    tracing::error!(document_id = %document.id, "Rollback failed: {}", rollback);
                }
                return Err(e);
            }
            document
        };

        tracing::info!(
            document_id = %document.id,
            filename = %document.filename,
            chunks = document.chunks.len(),
            "Uploaded document"
        );

        Ok(UploadReceipt {
            chunks_created: document.chunks.len(),
            document: document.summary(),
        })
    }

    /// All documents, oldest first.
    pub fn list(&self) -> AppResult<Vec<DocumentSummary>> {
        self.store.list()
    }

    /// Delete a document and everything derived from it.
    ///
    /// The index entries go first so no query can cite the document once
    /// deletion starts. If the store delete fails they are put back, unless
    /// the store no longer has the document.
    pub fn delete(&self, id: &str) -> AppResult<()> {
        let _writes = self.lock_writes();
        let removed = self.index.remove_document(id);

        match self.store.delete(id) {
            Ok(()) => {}
            Err(AppError::NotFound(what)) => {
                if !removed.is_empty() {
                    tracing::warn!(
                        document_id = id,
                        dropped = removed.len(),
                        "Dropped index entries of a document missing from the store"
                    );
                }
                return Err(AppError::NotFound(what));
            }
            Err(e) => {
                self.index.restore(removed);
                return Err(e);
            }
        }

        tracing::info!(document_id = id, "Deleted document");
        Ok(())
    }

    /// Answer a question from the corpus with cited sources.
    pub async fn ask(&self, question: &str) -> AppResult<Answer> {
        self.synthesizer.answer(question).await
    }

    pub async fn health(&self) -> HealthReport {
        self.monitor.check().await
    }

    /// Start periodic health checks.
    pub fn health_scheduler(&self, interval: Duration) -> HealthScheduler {
        HealthScheduler::spawn(Arc::clone(&self.monitor), interval)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> AppResult<CorpusStats> {
        let store = self.store.stats()?;
        Ok(CorpusStats {
            documents_count: store.documents_count,
            chunks_count: store.chunks_count,
            indexed_chunks: self.index.len(),
            db_size_bytes: store.db_size_bytes,
            embedding_fingerprint: store.embedding_fingerprint,
            last_upload_at: store.last_upload_at,
        })
    }
}

fn validate_filename(filename: &str) -> AppResult<()> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Filename cannot be empty".to_string()));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(AppError::Validation(format!(
            "Filename must not contain a path: {}",
            filename
        )));
    }
    if !trimmed.to_ascii_lowercase().ends_with(".txt") || trimmed.len() <= ".txt".len() {
        return Err(AppError::Validation(format!(
            "Only .txt files are supported: {}",
            filename
        )));
    }
    Ok(())
}

/// Make sure every stored vector belongs to `fingerprint`'s space.
async fn reconcile_embeddings(
    store: &DocumentStore,
    embedder: &dyn EmbeddingProvider,
    fingerprint: &str,
    batch_size: usize,
) -> AppResult<()> {
    let stored = store.embedding_fingerprint()?;

    match stored.as_deref() {
        Some(current) if current == fingerprint => Ok(()),
        None if store.chunk_count()? == 0 => store.set_embedding_fingerprint(fingerprint),
        previous => {
            let chunks = store.all_chunks()?;
            tracing::warn!(
                from = previous.unwrap_or("unknown"),
                to = fingerprint,
                chunks = chunks.len(),
                "Embedding model changed, re-embedding stored chunks"
            );

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embed_texts(embedder, &texts, batch_size).await?;
            let updates: Vec<(String, Vec<f32>)> = chunks
                .into_iter()
                .map(|c| c.id)
                .zip(vectors)
                .collect();

            store.replace_embeddings(&updates, fingerprint)
        }
    }
}

/// Load stored chunks into the index, one document per critical section.
fn rebuild_index(index: &dyn VectorIndex, chunks: Vec<Chunk>) -> AppResult<()> {
    let mut current: Option<String> = None;
    let mut batch: Vec<(String, Vec<f32>)> = Vec::new();

    for chunk in chunks {
        if current.as_deref() != Some(chunk.document_id.as_str()) {
            if let Some(document_id) = current.take() {
                index.add_document(&document_id, std::mem::take(&mut batch))?;
            }
            current = Some(chunk.document_id.clone());
        }
        batch.push((chunk.id, chunk.embedding));
    }

    if let Some(document_id) = current {
        index.add_document(&document_id, batch)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use docqa_llm::ExtractiveClient;
    use docqa_prompt::default_prompt;

    async fn service() -> KnowledgeService {
        KnowledgeService::with_parts(
            DocumentStore::open_in_memory().unwrap(),
            Arc::new(TrigramProvider::new(384)),
            Arc::new(ExtractiveClient::new()),
            default_prompt(),
            "test-model",
            KnowledgeConfig::default(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("notes.txt").is_ok());
        assert!(validate_filename("NOTES.TXT").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename(".txt").is_err());
        assert!(validate_filename("report.pdf").is_err());
        assert!(validate_filename("../etc/passwd.txt").is_err());
    }

    #[tokio::test]
    async fn test_delete_of_already_removed_document_keeps_index_empty() {
        let service = service().await;
        let receipt = service
            .upload("sky.txt", "The sky is blue. Grass is green.")
            .await
            .unwrap();

        // Another deleter won the race for the store row.
        service.store.delete(&receipt.document.id).unwrap();

        let err = service.delete(&receipt.document.id).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let stats = service.stats().unwrap();
        assert_eq!(stats.chunks_count, 0);
        assert_eq!(stats.indexed_chunks, stats.chunks_count);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_leave_index_consistent() {
        let service = Arc::new(service().await);
        for round in 0..20 {
            let receipt = service
                .upload(&format!("doc{}.txt", round), "Rust compiles to native code.")
                .await
                .unwrap();

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let service = Arc::clone(&service);
                    let id = receipt.document.id.clone();
                    std::thread::spawn(move || service.delete(&id).is_ok())
                })
                .collect();
            let deleted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(deleted, 1);

            let stats = service.stats().unwrap();
            assert_eq!(stats.indexed_chunks, stats.chunks_count);
        }
    }
}
