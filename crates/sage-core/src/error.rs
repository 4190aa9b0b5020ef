//! Error types for datasage.

use thiserror::Error;

/// Result type alias using datasage's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for datasage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither index has any data yet. A normal empty state, not a failure:
    /// the streaming path reports it as an `error` event and the pipeline
    /// continues to serve other requests.
    #[error("No documents ingested yet.")]
    IndexUnavailable,

    /// A sub-index query failed.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Text generation failed (worker-reported)
    #[error("Generation error: {0}")]
    Generation(String),

    /// The generation worker produced no event within the wait window.
    #[error("timeout")]
    GenerationTimeout,

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conversation not found (or not owned by the caller)
    #[error("Conversation not found: {0}")]
    ConversationNotFound(uuid::Uuid),

    /// Missing or unusable caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
