//! Structured logging schema and field name constants for lumen.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), job completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (stream deltas, hits) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP request.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "jobs", "inference", "vector"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "queue", "ollama", "openai", "qdrant", "extractor"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "embed_texts", "chat_stream", "upsert", "query"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Job identifier being processed.
pub const JOB_ID: &str = "job_id";

/// Job kind: chat, embed, vector_upload, vector_query.
pub const JOB_KIND: &str = "job_kind";

/// Vector collection name.
pub const COLLECTION: &str = "collection";

/// Index of the worker task in the pool.
pub const WORKER_INDEX: &str = "worker";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of input texts sent to an embedding model.
pub const INPUT_COUNT: &str = "input_count";

/// Number of chat messages sent to a model.
pub const MESSAGE_COUNT: &str = "message_count";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Advisory task queue depth.
pub const QUEUE_SIZE: &str = "queue_size";

/// Number of jobs removed by a retention sweep.
pub const PURGED_COUNT: &str = "purged_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Whether the job degraded to a fallback result.
pub const DEGRADED: &str = "degraded";

/// Error message text.
pub const ERROR_MSG: &str = "error";

/// Marks an operation that exceeded its slow threshold.
pub const SLOW: &str = "slow";
