//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the OpenAI embeddings and chat
//! completions API, including OpenAI itself, vLLM, LocalAI, LM Studio and
//! Ollama in compatibility mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use lumen_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use lumen_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         embed_model: "nomic-embed-text".to_string(),
//!         embed_dimension: 768,
//!         ..OpenAIConfig::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let vector = backend.embed("Hello, world!").await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod streaming;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_lumen_error, OpenAIErrorCode};
pub use streaming::parse_sse_stream;
pub use types::*;
