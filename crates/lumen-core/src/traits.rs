//! Provider traits: inference backends, vector stores, and document extraction.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ChatMessage, Metadata, QueryHit};

/// Dense embedding vector.
pub type Vector = Vec<f32>;

/// Stream of generated text deltas.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// =============================================================================
// INFERENCE
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("backend returned no embedding".to_string()))
    }

    /// Dimension of the vectors this backend produces.
    fn dimension(&self) -> usize;

    /// Model name used for embeddings.
    fn model_name(&self) -> &str;
}

/// Backend for streaming chat completion.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a completion and return its text deltas as they arrive.
    ///
    /// An `Err` return means the stream could not be opened; an `Err` item
    /// means it broke part-way.
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream>;

    /// Model name used for chat.
    fn model_name(&self) -> &str;
}

/// A complete inference backend.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + ChatBackend {
    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// VECTOR STORE
// =============================================================================

/// A document vector with its payload, ready for upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vector,
    pub payload: Metadata,
}

impl VectorPoint {
    pub fn new(vector: Vector, payload: Metadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            payload,
        }
    }
}

/// Named collections of vectors with cosine-similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create a collection. Fails with [`Error::CollectionExists`] if present.
    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Create the collection unless it already exists.
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }
        match self.create_collection(collection, dimension).await {
            Ok(()) | Err(Error::CollectionExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Insert or replace points; returns how many were written.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<usize>;

    /// Top `limit` hits for `vector`, ordered by descending score.
    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<QueryHit>>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Document format, as detected from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
    Html,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Html => "html",
            DocumentFormat::PlainText => "plain_text",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text pulled out of a document.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    /// Format-specific counts (pages, sheets, slides, chars).
    pub metadata: JsonValue,
}

/// Extracts plain text from one document format.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// The format this adapter handles.
    fn format(&self) -> DocumentFormat;

    /// Extract text from raw document bytes.
    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult>;

    /// Adapter name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingBackend for FixedEmbedder {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_embed_default_uses_batch() {
        let v = FixedEmbedder.embed("abcd").await.unwrap();
        assert_eq!(v, vec![4.0]);
    }

    /// Store whose `create_collection` always reports a lost race.
    struct RacingStore {
        creates: AtomicUsize,
        names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorStore for RacingStore {
        async fn collection_exists(&self, _collection: &str) -> Result<bool> {
            Ok(false)
        }

        async fn create_collection(&self, collection: &str, _dimension: usize) -> Result<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.names.lock().unwrap().push(collection.to_string());
            Err(Error::CollectionExists(collection.to_string()))
        }

        async fn upsert(&self, _collection: &str, points: Vec<VectorPoint>) -> Result<usize> {
            Ok(points.len())
        }

        async fn query(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<QueryHit>> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "racing"
        }
    }

    #[tokio::test]
    async fn test_ensure_collection_tolerates_concurrent_create() {
        let store = RacingStore {
            creates: AtomicUsize::new(0),
            names: Mutex::new(vec![]),
        };
        store.ensure_collection("docs", 3).await.unwrap();
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(store.names.lock().unwrap().as_slice(), ["docs"]);
    }

    #[test]
    fn test_document_format_names() {
        assert_eq!(DocumentFormat::PlainText.to_string(), "plain_text");
        assert_eq!(DocumentFormat::Pptx.as_str(), "pptx");
    }

    #[test]
    fn test_vector_point_ids_unique() {
        let a = VectorPoint::new(vec![1.0], Metadata::new());
        let b = VectorPoint::new(vec![1.0], Metadata::new());
        assert_ne!(a.id, b.id);
    }
}
