//! Embedding generation for the corpus.
//!
//! Provides provider-agnostic embedding generation. Every vector in the store
//! and the index belongs to the embedding space named by
//! [`EmbeddingConfig::fingerprint`].

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use docqa_core::{AppError, AppResult};

/// Embed texts in batches of `batch_size`, checking each vector's length.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    tracing::debug!(
        "Embedding {} texts using provider '{}' (model: {})",
        texts.len(),
        provider.provider_name(),
        provider.model_name()
    );

    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Storage(format!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        embeddings.extend(vectors);
    }

    if let Some(bad) = embeddings.iter().find(|v| v.len() != provider.dimensions()) {
        return Err(AppError::Storage(format!(
            "Embedding has {} dimensions, expected {}",
            bad.len(),
            provider.dimensions()
        )));
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;

    #[tokio::test]
    async fn test_embed_texts_in_batches() {
        let provider = TrigramProvider::new(64);
        let texts: Vec<String> = (0..7).map(|i| format!("document number {}", i)).collect();

        let embeddings = embed_texts(&provider, &texts, 3).await.unwrap();

        assert_eq!(embeddings.len(), 7);
        assert!(embeddings.iter().all(|e| e.len() == 64));
    }

    #[tokio::test]
    async fn test_embed_texts_empty() {
        let provider = TrigramProvider::new(64);
        let embeddings = embed_texts(&provider, &[], 10).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
