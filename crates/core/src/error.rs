//! Error types for the IssuesPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Wire-level failures are
//! captured per bounded context ([`ProviderError`], [`IndexError`]) and
//! classified into the top-level [`Error`] taxonomy that the conversation
//! loop reports to the operator.

use thiserror::Error;

/// The top-level error type for all IssuesPilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Startup ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Retrieval path ---
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Vector index error: {0}")]
    Index(IndexError),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    // --- Generation path ---
    #[error("Rate limited by LLM provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("LLM authentication failed: {0}")]
    Authentication(String),

    #[error("LLM model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Prompt exceeds the model context window: {0}")]
    ContextOverflow(String),

    #[error("LLM request rejected: {0}")]
    Provider(ProviderError),

    // --- Plumbing ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// --- Bounded context errors ---

/// Failures talking to an LLM or embeddings endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether a later attempt could succeed without any change to the request.
    ///
    /// Rate limits, server-side failures and transport problems are transient;
    /// auth and request-shape errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::ModelNotFound(_) | Self::NotConfigured(_) => {
                false
            }
        }
    }
}

/// Failures talking to the vector store.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("cannot reach vector store: {0}")]
    Unavailable(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("vector store request failed: {message} (status: {status_code})")]
    RequestFailed { status_code: u16, message: String },

    #[error("unexpected vector store response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: collection has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Unavailable(reason) => Error::IndexUnavailable(reason),
            other => Error::Index(other),
        }
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { retry_after_secs } => {
                Error::RateLimited { retry_after_secs }
            }
            ProviderError::AuthenticationFailed(reason) => Error::Authentication(reason),
            ProviderError::ModelNotFound(model) => {
                Error::ModelUnavailable(format!("model '{model}' not found"))
            }
            ProviderError::NotConfigured(reason) => Error::Config { message: reason },
            ProviderError::Timeout(reason) | ProviderError::Network(reason) => {
                Error::ModelUnavailable(reason)
            }
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                if (status_code == 400 || status_code == 413)
                    && mentions_context_overflow(&message)
                {
                    Error::ContextOverflow(message)
                } else if status_code == 404 || status_code >= 500 {
                    Error::ModelUnavailable(format!("status {status_code}: {message}"))
                } else {
                    Error::Provider(ProviderError::ApiError {
                        status_code,
                        message,
                    })
                }
            }
        }
    }
}

/// Heuristic over the error bodies returned by OpenAI and Anthropic when the
/// prompt is larger than the model accepts.
fn mentions_context_overflow(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "context_length_exceeded",
        "context length",
        "context window",
        "maximum context",
        "prompt is too long",
        "too many tokens",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}
