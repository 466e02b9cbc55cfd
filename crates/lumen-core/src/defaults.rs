//! Centralized default constants for the lumen service.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area; environment overrides are read by the
//! `from_env()` constructor of the component that owns the value.

// =============================================================================
// QUEUE & WORKER
// =============================================================================

/// Bounded task queue capacity.
pub const QUEUE_CAPACITY: usize = 1000;

/// Largest accepted `QUEUE_CAPACITY`.
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

/// Number of worker tasks draining the queue. One keeps strict FIFO execution.
pub const WORKER_COUNT: usize = 1;

/// Upper bound on a single job's execution time.
pub const JOB_TIMEOUT_SECS: u64 = 600;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Text appended to a chat completion when the provider fails.
pub const CHAT_ERROR_TEXT: &str = "An error occurred.";

// =============================================================================
// RETENTION
// =============================================================================

/// Age after which finished/failed jobs are purged. Zero disables purging.
pub const JOB_RETENTION_SECS: u64 = 3600;

/// Interval between retention sweeps.
pub const JOB_RETENTION_SWEEP_SECS: u64 = 60;

// =============================================================================
// VECTOR STORE
// =============================================================================

/// Number of ranked hits returned by a vector query.
pub const RESULT_LIMIT: usize = 5;

/// Default Qdrant REST endpoint.
pub const QDRANT_URL: &str = "http://127.0.0.1:6333";

/// Payload key under which the extracted document text is stored.
pub const CONTENT_KEY: &str = "content";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Default chat model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Embedding calls slower than this are logged as slow.
pub const SLOW_EMBED_MS: u64 = 5_000;

/// Chat streams slower than this are logged as slow.
pub const SLOW_GEN_MS: u64 = 30_000;

// =============================================================================
// SERVER
// =============================================================================

/// Default bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum request body size (document uploads are base64 in JSON).
pub const MAX_BODY_SIZE_BYTES: usize = 64 * 1024 * 1024;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Largest uncompressed size of a single member read from an OOXML archive.
pub const MAX_ARCHIVE_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Largest total uncompressed size of an OOXML archive.
pub const MAX_ARCHIVE_EXPANDED_BYTES: u64 = 256 * 1024 * 1024;
