//! # lumen-core
//!
//! Core types, traits, and abstractions for the lumen inference job service.
//!
//! This crate provides the job data model, the error type, and the provider
//! traits (embedding, streaming chat, vector store, document extraction) that
//! the other lumen crates implement or depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
