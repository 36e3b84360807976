//! Error types for Retake.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Event URL is malformed or not a recognised tournament source.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// A uniqueness key (event URL, external match id) already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Vectors from two different embedding versions or dimensions met.
    #[error("Embedding mismatch: {0}")]
    EmbeddingMismatch(String),

    /// Crawl target unreachable after retries.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
