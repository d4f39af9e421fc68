//! In-memory embedding index over chunk vectors.
//!
//! The index is a derived structure: the document store holds the durable
//! copy of every vector and the index is rebuilt from it on open.

use docqa_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// One indexed vector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub document_id: String,
    pub vector: Vec<f32>,
    seq: u64,
}

/// Nearest-neighbour index over chunk embeddings.
///
/// Scores are cosine similarity clamped to `[0, 1]`. Results come back in
/// descending score order; equal scores keep insertion order.
pub trait VectorIndex: Send + Sync {
    /// Embedding space this index was built for.
    fn fingerprint(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Insert or replace the vector for `chunk_id`.
    ///
    /// Re-adding an id keeps its original position for tie-breaking.
    fn add(&self, chunk_id: &str, document_id: &str, vector: Vec<f32>) -> AppResult<()>;

    /// Insert all vectors of one document in a single critical section.
    ///
    /// Either every entry is added or, on a dimension mismatch, none is.
    fn add_document(&self, document_id: &str, entries: Vec<(String, Vec<f32>)>) -> AppResult<()>;

    /// Remove one chunk; absent ids are ignored.
    fn remove(&self, chunk_id: &str);

    /// Remove every chunk of a document and hand the entries back.
    fn remove_document(&self, document_id: &str) -> Vec<IndexEntry>;

    /// Put back entries returned by [`VectorIndex::remove_document`].
    fn restore(&self, entries: Vec<IndexEntry>);

    /// Up to `k` `(chunk_id, score)` pairs, best first.
    fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<(String, f32)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct documents with at least one indexed chunk.
    fn document_count(&self) -> usize;
}

#[derive(Debug, Default)]
struct Entries {
    by_seq: BTreeMap<u64, IndexEntry>,
    seq_by_chunk: HashMap<String, u64>,
    next_seq: u64,
}

impl Entries {
    fn upsert(&mut self, chunk_id: &str, document_id: &str, vector: Vec<f32>) {
        if let Some(seq) = self.seq_by_chunk.get(chunk_id) {
            if let Some(entry) = self.by_seq.get_mut(seq) {
                entry.document_id = document_id.to_string();
                entry.vector = vector;
                return;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_by_chunk.insert(chunk_id.to_string(), seq);
        self.by_seq.insert(
            seq,
            IndexEntry {
                chunk_id: chunk_id.to_string(),
                document_id: document_id.to_string(),
                vector,
                seq,
            },
        );
    }
}

/// Brute-force cosine index held in memory behind a read/write lock.
#[derive(Debug)]
pub struct MemoryIndex {
    fingerprint: String,
    dimensions: usize,
    entries: RwLock<Entries>,
}

impl MemoryIndex {
    pub fn new(fingerprint: impl Into<String>, dimensions: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            dimensions,
            entries: RwLock::new(Entries::default()),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::Storage(format!(
                "Vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

impl VectorIndex for MemoryIndex {
    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn add(&self, chunk_id: &str, document_id: &str, vector: Vec<f32>) -> AppResult<()> {
        self.check_dimensions(&vector)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.upsert(chunk_id, document_id, vector);
        Ok(())
    }

    fn add_document(&self, document_id: &str, entries: Vec<(String, Vec<f32>)>) -> AppResult<()> {
        for (_, vector) in &entries {
            self.check_dimensions(vector)?;
        }

        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (chunk_id, vector) in entries {
            guard.upsert(&chunk_id, document_id, vector);
        }
        Ok(())
    }

    fn remove(&self, chunk_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(seq) = entries.seq_by_chunk.remove(chunk_id) {
            entries.by_seq.remove(&seq);
        }
    }

    fn remove_document(&self, document_id: &str) -> Vec<IndexEntry> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let seqs: Vec<u64> = entries
            .by_seq
            .values()
            .filter(|e| e.document_id == document_id)
            .map(|e| e.seq)
            .collect();

        let mut removed = Vec::with_capacity(seqs.len());
        for seq in seqs {
            if let Some(entry) = entries.by_seq.remove(&seq) {
                entries.seq_by_chunk.remove(&entry.chunk_id);
                removed.push(entry);
            }
        }

        tracing::debug!(
            document_id,
            removed = removed.len(),
            "Removed document from index"
        );
        removed
    }

    fn restore(&self, removed: Vec<IndexEntry>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for entry in removed {
            if entries.seq_by_chunk.contains_key(&entry.chunk_id) {
                continue;
            }
            entries.seq_by_chunk.insert(entry.chunk_id.clone(), entry.seq);
            entries.by_seq.insert(entry.seq, entry);
        }
    }

    fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<(String, f32)>> {
        self.check_dimensions(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        // by_seq iterates in insertion order and the sort is stable.
        let mut scored: Vec<(String, f32)> = entries
            .by_seq
            .values()
            .map(|e| (e.chunk_id.clone(), relevance(vector, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_seq
            .len()
    }

    fn document_count(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .by_seq
            .values()
            .map(|e| e.document_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Cosine similarity clamped to `[0, 1]`; zero when either vector is zero.
pub fn relevance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> MemoryIndex {
        MemoryIndex::new("test/unit/3", 3)
    }

    #[test]
    fn test_query_orders_by_score() {
        let index = index();
        index.add("far", "d1", vec![0.0, 1.0, 0.0]).unwrap();
        index.add("near", "d1", vec![1.0, 0.1, 0.0]).unwrap();
        index.add("exact", "d2", vec![1.0, 0.0, 0.0]).unwrap();

        let results = index.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "exact");
        assert_eq!(results[1].0, "near");
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index();
        index.add("first", "d1", vec![1.0, 0.0, 0.0]).unwrap();
        index.add("second", "d1", vec![1.0, 0.0, 0.0]).unwrap();
        index.add("third", "d1", vec![2.0, 0.0, 0.0]).unwrap();

        let ids: Vec<String> = index
            .query(&[1.0, 0.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_readd_is_idempotent() {
        let index = index();
        index.add("a", "d1", vec![1.0, 0.0, 0.0]).unwrap();
        index.add("b", "d1", vec![1.0, 0.0, 0.0]).unwrap();
        let before = index.query(&[1.0, 0.0, 0.0], 5).unwrap();

        index.add("a", "d1", vec![1.0, 0.0, 0.0]).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 5).unwrap(), before);
    }

    #[test]
    fn test_negative_similarity_clamped() {
        let index = index();
        index.add("opposite", "d1", vec![-1.0, 0.0, 0.0]).unwrap();
        let results = index.query(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = index();
        assert!(index.is_empty());
        assert!(index.query(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = index();
        assert!(matches!(
            index.add("a", "d1", vec![1.0]),
            Err(AppError::Storage(_))
        ));
        assert!(index.query(&[1.0], 1).is_err());
    }

    #[test]
    fn test_add_document_is_all_or_nothing() {
        let index = index();
        let result = index.add_document(
            "d1",
            vec![
                ("a".to_string(), vec![1.0, 0.0, 0.0]),
                ("b".to_string(), vec![1.0]),
            ],
        );
        assert!(result.is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_document_and_restore() {
        let index = index();
        index
            .add_document(
                "d1",
                vec![
                    ("a".to_string(), vec![1.0, 0.0, 0.0]),
                    ("b".to_string(), vec![0.0, 1.0, 0.0]),
                ],
            )
            .unwrap();
        index.add("c", "d2", vec![1.0, 0.0, 0.0]).unwrap();
        assert_eq!(index.document_count(), 2);

        let removed = index.remove_document("d1");
        assert_eq!(removed.len(), 2);
        assert_eq!(index.len(), 1);
        let ids: Vec<String> = index
            .query(&[1.0, 0.0, 0.0], 5)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["c"]);

        index.restore(removed);
        assert_eq!(index.len(), 3);
        // "a" was inserted before "c" and wins the tie again.
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 1).unwrap()[0].0, "a");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let index = index();
        index.remove("missing");
        assert!(index.remove_document("missing").is_empty());
    }
}
