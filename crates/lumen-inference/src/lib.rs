//! # lumen-inference
//!
//! Inference backends for lumen jobs.
//!
//! This crate provides:
//! - Ollama implementation (default): `/api/embed` and streaming `/api/chat`
//! - OpenAI-compatible implementation (feature `openai`): `/embeddings` and
//!   streaming `/chat/completions`
//! - A deterministic mock backend (feature `mock`) for tests
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `openai`: Enable OpenAI-compatible backend
//! - `mock`: Enable [`mock::MockInferenceBackend`]
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use lumen_core::{ChatBackend, ChatMessage, ChatRole};
//! use lumen_inference::OllamaBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let messages = vec![ChatMessage::new(ChatRole::User, "Hello")];
//!     let mut deltas = backend.chat_stream(&messages).await.unwrap();
//!     while let Some(delta) = deltas.next().await {
//!         print!("{}", delta.unwrap());
//!     }
//! }
//! ```

pub mod streaming;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::{ChatFailure, MockCall, MockInferenceBackend};
