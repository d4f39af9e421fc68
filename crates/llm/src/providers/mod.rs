//! Provider implementations and shared HTTP error mapping.

pub mod extractive;
pub mod ollama;
pub mod openai;

pub use extractive::ExtractiveClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use docqa_core::{AppError, AppResult, BackendErrorKind};
use reqwest::StatusCode;
use std::time::Duration;

/// Default per-request timeout for network providers.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build a reqwest client with an explicit request timeout.
///
/// A client that cannot honor the timeout is a configuration error, never
/// replaced by one without it.
pub(crate) fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport-level failure (no response received).
pub(crate) fn send_error(provider: &str, err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() {
        BackendErrorKind::Timeout
    } else {
        BackendErrorKind::Unavailable
    };
    AppError::backend(kind, format!("{} request failed: {}", provider, err))
}

/// Map a non-success HTTP status to the error taxonomy.
///
/// Statuses that say the backend cannot serve right now become
/// `BackendUnavailable`; anything else means the backend answered but the
/// call cannot produce a usable result, which is a `Synthesis` failure.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    let detail = format!("{} API error ({}): {}", provider, status, body.trim());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::backend(BackendErrorKind::Auth, detail)
        }
        StatusCode::TOO_MANY_REQUESTS => AppError::backend(BackendErrorKind::RateLimited, detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AppError::backend(BackendErrorKind::Timeout, detail)
        }
        s if s.is_server_error() => AppError::backend(BackendErrorKind::Unavailable, detail),
        _ => AppError::Synthesis(detail),
    }
}
