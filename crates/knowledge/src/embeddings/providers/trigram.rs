//! Trigram embedding provider using hashed word and character trigram features.

use crate::embeddings::provider::EmbeddingProvider;
use docqa_core::AppResult;
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "who", "when", "where", "how", "does", "did",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings from Unicode words: each word
/// contributes its whole-word hash plus one hash per character trigram.
/// Not semantically aware like neural models, but texts sharing words or
/// word stems land close together, which is enough for keyword-grounded
/// retrieval without any network dependency.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    normalize: bool,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self::with_normalize(dimensions, true)
    }

    pub fn with_normalize(dimensions: usize, normalize: bool) -> Self {
        Self {
            dimensions: dimensions.max(1),
            normalize,
        }
    }

    /// Generate a trigram-based embedding for text.
    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];

        let lower = text.to_lowercase();
        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower.unicode_words() {
            if word.chars().count() > 2 && !STOP_WORDS.contains(&word) {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram_hash = window.iter().fold(0u64, |acc, c| {
                    acc.wrapping_mul(37).wrapping_add(*c as u64)
                });
                let dim_idx = (trigram_hash % self.dimensions as u64) as usize;
                embedding[dim_idx] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let base_dim = (word_hash % self.dimensions as u64) as usize;
            embedding[base_dim] += *freq as f32;
        }

        if self.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}
