//! # lumen-vector
//!
//! Vector store backends for lumen's upload and query jobs.
//!
//! - [`InMemoryVectorStore`]: process-local cosine similarity search (default)
//! - [`QdrantStore`]: Qdrant over its REST API
//!
//! Select one at startup with [`store_from_env`].

pub mod memory;
pub mod qdrant;

use std::sync::Arc;

use tracing::info;

use lumen_core::{Error, Result, VectorStore};

pub use memory::{cosine_similarity, InMemoryVectorStore};
pub use qdrant::{QdrantConfig, QdrantStore};

/// Build the vector store named by `VECTOR_STORE` (`memory` or `qdrant`).
pub fn store_from_env() -> Result<Arc<dyn VectorStore>> {
    let kind = std::env::var("VECTOR_STORE").unwrap_or_else(|_| "memory".to_string());
    store_by_name(&kind)
}

fn store_by_name(kind: &str) -> Result<Arc<dyn VectorStore>> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "memory" | "in-memory" | "" => {
            info!(store = "memory", "Using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        "qdrant" => {
            let store = QdrantStore::new(QdrantConfig::from_env())?;
            info!(store = "qdrant", url = %store.config().url, "Using Qdrant vector store");
            Ok(Arc::new(store))
        }
        other => Err(Error::Config(format!(
            "Unknown VECTOR_STORE '{}', expected 'memory' or 'qdrant'",
            other
        ))),
    }
}
