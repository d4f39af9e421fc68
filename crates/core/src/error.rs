//! Error types for docqa.
//!
//! This module defines a unified error enum covering the whole taxonomy of the
//! question-answering core: input validation, missing records, empty corpus,
//! language-model backend failures, storage failures and synthesis failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a language-model backend call failed before producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// The call did not complete within its timeout
    Timeout,
    /// The backend rejected the call because of rate limiting
    RateLimited,
    /// Credentials missing or rejected
    Auth,
    /// Connection refused, DNS failure, 5xx responses
    Unavailable,
}

impl BackendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::Auth => "authentication failed",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error categories, used by callers that pick a remediation
/// (exit codes, HTTP statuses) without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NoDocuments,
    BackendUnavailable,
    Storage,
    Synthesis,
    Internal,
}

/// Unified error type for docqa.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Empty or invalid input, unsupported file type
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown document or chunk id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upload rejected because the filename is already taken
    #[error("A document named '{0}' already exists")]
    DuplicateFilename(String),

    /// Retrieval against an empty corpus
    #[error("No documents uploaded yet")]
    NoDocuments,

    /// Documents exist but none of their passages relate to the question
    #[error("No relevant content found in the uploaded documents")]
    NoRelevantContent,

    /// Language-model backend unreachable, timed out, rate-limited or refused credentials
    #[error("LLM backend {kind}: {message}")]
    BackendUnavailable {
        kind: BackendErrorKind,
        message: String,
    },

    /// Document store or embedding index failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Backend responded but the result was unusable
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt definition or rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Shorthand for a backend failure.
    pub fn backend(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        AppError::BackendUnavailable {
            kind,
            message: message.into(),
        }
    }

    /// Map the error to its taxonomy category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::DuplicateFilename(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::NoDocuments | AppError::NoRelevantContent => ErrorKind::NoDocuments,
            AppError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            AppError::Storage(_) => ErrorKind::Storage,
            AppError::Synthesis(_) => ErrorKind::Synthesis,
            AppError::Config(_)
            | AppError::Prompt(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether a single bounded retry may succeed.
    ///
    /// Authentication failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::BackendUnavailable {
                kind: BackendErrorKind::Timeout
                    | BackendErrorKind::RateLimited
                    | BackendErrorKind::Unavailable,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            AppError::Validation("empty".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::DuplicateFilename("a.txt".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(AppError::NoDocuments.kind(), ErrorKind::NoDocuments);
        assert_eq!(AppError::NoRelevantContent.kind(), ErrorKind::NoDocuments);
        assert_eq!(
            AppError::backend(BackendErrorKind::Auth, "bad key").kind(),
            ErrorKind::BackendUnavailable
        );
    }

    #[test]
    fn test_retryable() {
        assert!(AppError::backend(BackendErrorKind::Timeout, "30s").is_retryable());
        assert!(AppError::backend(BackendErrorKind::RateLimited, "429").is_retryable());
        assert!(AppError::backend(BackendErrorKind::Unavailable, "503").is_retryable());
        assert!(!AppError::backend(BackendErrorKind::Auth, "401").is_retryable());
        assert!(!AppError::Synthesis("empty".into()).is_retryable());
    }

    #[test]
    fn test_messages_distinguish_remediation() {
        let none = AppError::NoDocuments.to_string();
        let irrelevant = AppError::NoRelevantContent.to_string();
        let backend = AppError::backend(BackendErrorKind::Unavailable, "connection refused").to_string();
        assert_ne!(none, irrelevant);
        assert!(backend.contains("unavailable"));
        assert!(backend.contains("connection refused"));
    }
}
