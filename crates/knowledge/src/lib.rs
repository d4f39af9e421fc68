//! Document question answering over a local corpus.
//!
//! Plain-text documents are chunked, embedded and persisted in SQLite; an
//! in-memory vector index is rebuilt from the store on open. Questions are
//! answered by a language-model backend from the most relevant passages,
//! and every answer carries the passages it was grounded on.
//!
//! [`KnowledgeService`] is the entry point.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod health;
pub mod index;
pub mod retriever;
pub mod service;
pub mod store;
pub mod synthesizer;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{load_config, save_config, HealthConfig, KnowledgeConfig, SynthesisConfig};
pub use embeddings::EmbeddingConfig;
pub use health::{ComponentStatus, HealthMonitor, HealthReport, HealthScheduler, OverallStatus};
pub use service::KnowledgeService;
pub use types::{Answer, Citation, CorpusStats, DocumentSummary, UploadReceipt};
