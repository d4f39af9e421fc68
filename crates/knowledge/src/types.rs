//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// An uploaded plain-text document with its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque unique identifier (UUID v4)
    pub id: String,

    /// Original filename, always ending in `.txt`
    pub filename: String,

    /// When the document was ingested
    pub uploaded_at: DateTime<Utc>,

    /// SHA-256 of the raw text, hex encoded
    pub content_hash: String,

    /// Raw text size in bytes
    pub size_bytes: u64,

    /// Chunks ordered by `chunk_index`
    pub chunks: Vec<Chunk>,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
            chunk_count: self.chunks.len(),
        }
    }
}

/// Listing view of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: usize,
}

/// A contiguous passage of a document with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier
    pub id: String,

    /// Owning document
    pub document_id: String,

    /// Zero-based position within the document
    pub chunk_index: usize,

    /// Text content, never empty
    pub text: String,

    /// Byte offsets of `text` in the original document
    pub byte_start: usize,
    pub byte_end: usize,

    /// SHA-256 of `text`, hex encoded
    pub hash: String,

    /// Embedding vector
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// Chunker output before ids and embeddings are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    pub index: usize,
    pub text: String,
    pub byte_range: Range<usize>,
    pub hash: String,
}

/// Input to `DocumentStore::create`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub chunks: Vec<NewChunk>,
}

/// A chunk span paired with its embedding, ready to persist.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub span: ChunkSpan,
    pub embedding: Vec<f32>,
}

/// A chunk resolved for retrieval, with its parent filename.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRef {
    pub chunk: Chunk,
    pub filename: String,
}

/// One retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub filename: String,

    /// Cosine similarity clamped to [0, 1]
    pub relevance: f32,
}

/// A passage cited in support of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub filename: String,
    pub chunk_index: usize,
    pub relevance: f32,
    pub text: String,
}

impl From<&RetrievalResult> for Citation {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            filename: result.filename.clone(),
            chunk_index: result.chunk.chunk_index,
            relevance: result.relevance,
            text: result.chunk.text.clone(),
        }
    }
}

/// Synthesized answer with ordered citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Citation>,
}

/// Result of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub document: DocumentSummary,
    pub chunks_created: usize,
}

/// Corpus statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Number of documents
    pub documents_count: usize,

    /// Number of chunks
    pub chunks_count: usize,

    /// Entries currently served by the in-memory index
    pub indexed_chunks: usize,

    /// Database size in bytes
    pub db_size_bytes: u64,

    /// Embedding space the stored vectors belong to
    pub embedding_fingerprint: Option<String>,

    /// Most recent upload
    pub last_upload_at: Option<DateTime<Utc>>,
}
