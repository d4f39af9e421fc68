//! Text chunking on semantic boundaries with configurable size and overlap.

use crate::types::ChunkSpan;
use docqa_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

/// Split `text` into ordered chunks of at most `target_size` characters.
///
/// Boundaries prefer paragraphs, then sentences, then words, falling back to
/// characters only for runs longer than `target_size`. Consecutive chunks
/// share up to `overlap` characters. Chunks are trimmed, so joining them in
/// index order gives back the text minus boundary whitespace and overlap.
pub fn chunk_text(text: &str, target_size: usize, overlap: usize) -> AppResult<Vec<ChunkSpan>> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Document text is empty".to_string()));
    }
    if target_size == 0 {
        return Err(AppError::Validation(
            "Chunk size must be greater than zero".to_string(),
        ));
    }

    let config = ChunkConfig::new(target_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Validation(format!("Invalid chunk overlap: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkSpan> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .enumerate()
        .map(|(index, (offset, chunk))| ChunkSpan {
            index,
            text: chunk.to_string(),
            byte_range: offset..offset + chunk.len(),
            hash: sha256_hex(chunk),
        })
        .collect();

    tracing::debug!(
        "Chunked {} bytes into {} chunks (size: {}, overlap: {})",
        text.len(),
        chunks.len(),
        target_size,
        overlap
    );

    Ok(chunks)
}

/// SHA-256 of `text`, lowercase hex.
pub fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
