//! Error types for lumen.

use thiserror::Error;

use crate::models::JobStatus;

/// Result type alias using lumen's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lumen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vector collection not found
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Vector collection already exists
    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Vector store operation failed
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Document text extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Job processing error
    #[error("Job error: {0}")]
    Job(String),

    /// Task queue is at capacity
    #[error("Queue full: capacity {0} reached")]
    QueueFull(usize),

    /// Job status change that would move backwards or out of a terminal state
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

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
