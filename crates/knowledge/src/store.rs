//! SQLite-backed document store.
//!
//! Holds the durable copy of every document, chunk and embedding, plus the
//! fingerprint of the embedding space the vectors belong to. Every mutation is
//! a single transaction.

use crate::types::{Chunk, ChunkRef, Document, DocumentSummary, NewDocument};
use chrono::{DateTime, SecondsFormat, Utc};
use docqa_core::{AppError, AppResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const FINGERPRINT_KEY: &str = "embedding_fingerprint";

const CHUNK_COLUMNS: &str =
    "c.id, c.document_id, c.chunk_index, c.text, c.byte_start, c.byte_end, c.hash, c.embedding";

/// Counters reported by [`DocumentStore::stats`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub documents_count: usize,
    pub chunks_count: usize,
    pub db_size_bytes: u64,
    pub embedding_fingerprint: Option<String>,
    pub last_upload_at: Option<DateTime<Utc>>,
}

/// Persistent store of documents and their chunks.
pub struct DocumentStore {
    conn: Mutex<Connection>,
    unique_filenames: bool,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("unique_filenames", &self.unique_filenames)
            .finish_non_exhaustive()
    }
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Storage(format!("{}: {}", context, e))
}

impl DocumentStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(db_err("Failed to open SQLite store"))?;
        tracing::debug!("Opened document store at {:?}", db_path);
        Self::init(conn)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(db_err("Failed to open in-memory store"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                size_bytes INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                byte_start INTEGER NOT NULL,
                byte_end INTEGER NOT NULL,
                hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                UNIQUE (document_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
            CREATE INDEX IF NOT EXISTS idx_documents_filename ON documents(filename);

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err("Failed to create tables"))?;

        Ok(Self {
            conn: Mutex::new(conn),
            unique_filenames: false,
        })
    }

    /// Reject uploads whose filename is already stored.
    pub fn with_unique_filenames(mut self, unique: bool) -> Self {
        self.unique_filenames = unique;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist a document and all its chunks in one transaction.
    pub fn create(&self, new: NewDocument) -> AppResult<Document> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;

        if self.unique_filenames {
            let taken: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM documents WHERE filename = ?1)",
                    params![new.filename],
                    |row| row.get(0),
                )
                .map_err(db_err("Failed to check filename"))?;
            if taken {
                return Err(AppError::DuplicateFilename(new.filename));
            }
        }

        let document_id = uuid::Uuid::new_v4().to_string();
        let uploaded_at = Utc::now();

        tx.execute(
            "INSERT INTO documents (id, filename, uploaded_at, content_hash, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document_id,
                new.filename,
                uploaded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                new.content_hash,
                new.size_bytes as i64,
            ],
        )
        .map_err(db_err("Failed to insert document"))?;

        let mut chunks = Vec::with_capacity(new.chunks.len());
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks
                     (id, document_id, chunk_index, text, byte_start, byte_end, hash, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(db_err("Failed to prepare chunk insert"))?;

            for new_chunk in new.chunks {
                let chunk = Chunk {
                    id: uuid::Uuid::new_v4().to_string(),
                    document_id: document_id.clone(),
                    chunk_index: new_chunk.span.index,
                    text: new_chunk.span.text,
                    byte_start: new_chunk.span.byte_range.start,
                    byte_end: new_chunk.span.byte_range.end,
                    hash: new_chunk.span.hash,
                    embedding: new_chunk.embedding,
                };

                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.chunk_index as i64,
                    chunk.text,
                    chunk.byte_start as i64,
                    chunk.byte_end as i64,
                    chunk.hash,
                    embedding_to_bytes(&chunk.embedding),
                ])
                .map_err(db_err("Failed to insert chunk"))?;

                chunks.push(chunk);
            }
        }

        tx.commit().map_err(db_err("Failed to commit document"))?;

        tracing::debug!(
            document_id = %document_id,
            chunks = chunks.len(),
            "Stored document"
        );

        Ok(Document {
            id: document_id,
            filename: new.filename,
            uploaded_at,
            content_hash: new.content_hash,
            size_bytes: new.size_bytes,
            chunks,
        })
    }

    /// All documents, oldest upload first.
    pub fn list(&self) -> AppResult<Vec<DocumentSummary>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT d.id, d.filename, d.uploaded_at, COUNT(c.id)
                 FROM documents d LEFT JOIN chunks c ON c.document_id = d.id
                 GROUP BY d.seq
                 ORDER BY d.uploaded_at ASC, d.seq ASC",
            )
            .map_err(db_err("Failed to prepare list"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(DocumentSummary {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    uploaded_at: parse_timestamp(row, 2)?,
                    chunk_count: row.get::<_, i64>(3)? as usize,
                })
            })
            .map_err(db_err("Failed to list documents"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read document row"))
    }

    /// A document with its chunks in index order.
    pub fn get(&self, id: &str) -> AppResult<Document> {
        let conn = self.conn();

        let header = conn
            .query_row(
                "SELECT id, filename, uploaded_at, content_hash, size_bytes
                 FROM documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Document {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                        uploaded_at: parse_timestamp(row, 2)?,
                        content_hash: row.get(3)?,
                        size_bytes: row.get::<_, i64>(4)? as u64,
                        chunks: Vec::new(),
                    })
                },
            )
            .optional()
            .map_err(db_err("Failed to load document"))?;

        let mut document =
            header.ok_or_else(|| AppError::NotFound(format!("Document '{}'", id)))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks c WHERE c.document_id = ?1 ORDER BY c.chunk_index",
                CHUNK_COLUMNS
            ))
            .map_err(db_err("Failed to prepare chunk query"))?;
        document.chunks = stmt
            .query_map(params![id], chunk_from_row)
            .map_err(db_err("Failed to load chunks"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read chunk row"))?;

        Ok(document)
    }

    /// Delete a document and, by cascade, its chunks.
    pub fn delete(&self, id: &str) -> AppResult<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;

        let deleted = tx
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(db_err("Failed to delete document"))?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Document '{}'", id)));
        }

        tx.commit().map_err(db_err("Failed to commit delete"))?;
        tracing::debug!(document_id = id, "Deleted document");
        Ok(())
    }

    /// Resolve chunk ids to chunks plus filename, keeping input order.
    ///
    /// Ids that no longer exist are skipped.
    pub fn chunks_by_ids(&self, ids: &[String]) -> AppResult<Vec<ChunkRef>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, d.filename FROM chunks c
                 JOIN documents d ON d.id = c.document_id
                 WHERE c.id = ?1",
                CHUNK_COLUMNS
            ))
            .map_err(db_err("Failed to prepare chunk lookup"))?;

        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let found = stmt
                .query_row(params![id], |row| {
                    Ok(ChunkRef {
                        chunk: chunk_from_row(row)?,
                        filename: row.get(8)?,
                    })
                })
                .optional()
                .map_err(db_err("Failed to resolve chunk"))?;

            match found {
                Some(chunk_ref) => resolved.push(chunk_ref),
                None => tracing::debug!(chunk_id = %id, "Chunk vanished before resolution"),
            }
        }

        Ok(resolved)
    }

    /// Every chunk, grouped by document in upload order.
    pub fn all_chunks(&self) -> AppResult<Vec<Chunk>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chunks c
                 JOIN documents d ON d.id = c.document_id
                 ORDER BY d.seq, c.chunk_index",
                CHUNK_COLUMNS
            ))
            .map_err(db_err("Failed to prepare chunk scan"))?;

        let chunks = stmt
            .query_map([], chunk_from_row)
            .map_err(db_err("Failed to scan chunks"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to read chunk row"))?;
        Ok(chunks)
    }

    pub fn document_count(&self) -> AppResult<usize> {
        self.count("SELECT COUNT(*) FROM documents")
    }

    pub fn chunk_count(&self) -> AppResult<usize> {
        self.count("SELECT COUNT(*) FROM chunks")
    }

    fn count(&self, sql: &str) -> AppResult<usize> {
        self.conn()
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(db_err("Failed to count rows"))
    }

    /// Cheap liveness probe.
    pub fn ping(&self) -> AppResult<()> {
        self.conn()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(db_err("Database ping failed"))
    }

    /// Fingerprint of the embedding space the stored vectors belong to.
    pub fn embedding_fingerprint(&self) -> AppResult<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![FINGERPRINT_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("Failed to read embedding fingerprint"))
    }

    pub fn set_embedding_fingerprint(&self, fingerprint: &str) -> AppResult<()> {
        self.conn()
            .execute(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![FINGERPRINT_KEY, fingerprint],
            )
            .map(|_| ())
            .map_err(db_err("Failed to write embedding fingerprint"))
    }

    /// Swap every listed chunk's vector and record the new fingerprint, all
    /// in one transaction.
    pub fn replace_embeddings(
        &self,
        embeddings: &[(String, Vec<f32>)],
        fingerprint: &str,
    ) -> AppResult<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;

        {
            let mut stmt = tx
                .prepare("UPDATE chunks SET embedding = ?1 WHERE id = ?2")
                .map_err(db_err("Failed to prepare embedding update"))?;
            for (chunk_id, vector) in embeddings {
                stmt.execute(params![embedding_to_bytes(vector), chunk_id])
                    .map_err(db_err("Failed to update embedding"))?;
            }
        }

        tx.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![FINGERPRINT_KEY, fingerprint],
        )
        .map_err(db_err("Failed to write embedding fingerprint"))?;

        tx.commit().map_err(db_err("Failed to commit re-embedding"))?;
        Ok(())
    }

    pub fn stats(&self) -> AppResult<StoreStats> {
        let documents_count = self.document_count()?;
        let chunks_count = self.chunk_count()?;
        let embedding_fingerprint = self.embedding_fingerprint()?;

        let conn = self.conn();
        let db_size_bytes: i64 = conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .map_err(db_err("Failed to read database size"))?;

        let last_upload_at = conn
            .query_row(
                "SELECT uploaded_at FROM documents ORDER BY uploaded_at DESC, seq DESC LIMIT 1",
                [],
                |row| parse_timestamp(row, 0),
            )
            .optional()
            .map_err(db_err("Failed to read last upload"))?;

        Ok(StoreStats {
            documents_count,
            chunks_count,
            db_size_bytes: db_size_bytes.max(0) as u64,
            embedding_fingerprint,
            last_upload_at,
        })
    }
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let blob: Vec<u8> = row.get(7)?;
    let embedding = bytes_to_embedding(&blob)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Blob, Box::new(e)))?;

    Ok(Chunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        chunk_index: row.get::<_, i64>(2)? as usize,
        text: row.get(3)?,
        byte_start: row.get::<_, i64>(4)? as usize,
        byte_end: row.get::<_, i64>(5)? as usize,
        hash: row.get(6)?,
        embedding,
    })
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Storage(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkSpan, NewChunk};
    use tempfile::TempDir;

    fn new_document(filename: &str, texts: &[&str]) -> NewDocument {
        let mut offset = 0;
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let span = ChunkSpan {
                    index: i,
                    text: text.to_string(),
                    byte_range: offset..offset + text.len(),
                    hash: format!("hash-{}", i),
                };
                offset += text.len() + 1;
                NewChunk {
                    span,
                    embedding: vec![i as f32, 1.0],
                }
            })
            .collect();

        NewDocument {
            filename: filename.to_string(),
            content_hash: "content".to_string(),
            size_bytes: offset as u64,
            chunks,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = DocumentStore::open_in_memory().unwrap();
        let created = store
            .create(new_document("notes.txt", &["first", "second"]))
            .unwrap();

        let loaded = store.get(&created.id).unwrap();
        assert_eq!(loaded.filename, "notes.txt");
        assert_eq!(loaded.chunks.len(), 2);
        assert_eq!(loaded.chunks[1].chunk_index, 1);
        assert_eq!(loaded.chunks[1].text, "second");
        assert_eq!(loaded.chunks[1].embedding, vec![1.0, 1.0]);
        assert_eq!(loaded.chunks, created.chunks);
    }

    #[test]
    fn test_list_in_upload_order() {
        let store = DocumentStore::open_in_memory().unwrap();
        let a = store.create(new_document("a.txt", &["a"])).unwrap();
        let b = store.create(new_document("b.txt", &["b1", "b2"])).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[1].id, b.id);
        assert_eq!(listed[1].chunk_count, 2);
        assert!(listed[0].uploaded_at <= listed[1].uploaded_at);
    }

    #[test]
    fn test_duplicate_filenames_allowed_by_default() {
        let store = DocumentStore::open_in_memory().unwrap();
        let a = store.create(new_document("same.txt", &["x"])).unwrap();
        let b = store.create(new_document("same.txt", &["y"])).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.document_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_filename_rejected_when_unique() {
        let store = DocumentStore::open_in_memory()
            .unwrap()
            .with_unique_filenames(true);
        store.create(new_document("same.txt", &["x"])).unwrap();

        let err = store.create(new_document("same.txt", &["y"])).unwrap_err();
        assert!(matches!(err, AppError::DuplicateFilename(_)));
        assert_eq!(store.document_count().unwrap(), 1);
        assert_eq!(store.chunk_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_cascades() {
        let store = DocumentStore::open_in_memory().unwrap();
        let doc = store.create(new_document("a.txt", &["x", "y"])).unwrap();

        store.delete(&doc.id).unwrap();

        assert_eq!(store.chunk_count().unwrap(), 0);
        assert!(matches!(store.get(&doc.id), Err(AppError::NotFound(_))));
        assert!(matches!(store.delete(&doc.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_chunks_by_ids_skips_missing_and_keeps_order() {
        let store = DocumentStore::open_in_memory().unwrap();
        let doc = store.create(new_document("a.txt", &["x", "y"])).unwrap();

        let ids = vec![
            doc.chunks[1].id.clone(),
            "missing".to_string(),
            doc.chunks[0].id.clone(),
        ];
        let resolved = store.chunks_by_ids(&ids).unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].chunk.text, "y");
        assert_eq!(resolved[1].chunk.text, "x");
        assert_eq!(resolved[0].filename, "a.txt");
    }

    #[test]
    fn test_fingerprint_and_reembed() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert_eq!(store.embedding_fingerprint().unwrap(), None);

        store.set_embedding_fingerprint("trigram/trigram-v1/2").unwrap();
        let doc = store.create(new_document("a.txt", &["x"])).unwrap();

        store
            .replace_embeddings(&[(doc.chunks[0].id.clone(), vec![9.0, 9.0])], "other/m/2")
            .unwrap();

        assert_eq!(
            store.embedding_fingerprint().unwrap().as_deref(),
            Some("other/m/2")
        );
        assert_eq!(store.all_chunks().unwrap()[0].embedding, vec![9.0, 9.0]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("knowledge/store.sqlite");

        let id = {
            let store = DocumentStore::open(&path).unwrap();
            store.create(new_document("a.txt", &["x"])).unwrap().id
        };

        let store = DocumentStore::open(&path).unwrap();
        assert_eq!(store.list().unwrap()[0].id, id);
        let stats = store.stats().unwrap();
        assert_eq!(stats.documents_count, 1);
        assert_eq!(stats.chunks_count, 1);
        assert!(stats.db_size_bytes > 0);
        assert!(stats.last_upload_at.is_some());
    }

    #[test]
    fn test_ping() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert!(store.ping().is_ok());
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let v = vec![0.5, -1.25, 3.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&v)).unwrap(), v);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }
}
