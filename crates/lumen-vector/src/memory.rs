//! In-memory vector store with brute-force cosine similarity.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use lumen_core::{Error, QueryHit, Result, VectorPoint, VectorStore};

struct Collection {
    dimension: usize,
    points: HashMap<Uuid, VectorPoint>,
}

/// Process-local vector store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, if it exists.
    pub async fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
    }
}

/// Cosine similarity of two vectors; zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a > 0.0 && mag_b > 0.0 {
        dot / (mag_a * mag_b)
    } else {
        0.0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(Error::CollectionExists(collection.to_string()));
        }
        collections.insert(
            collection.to_string(),
            Collection {
                dimension,
                points: HashMap::new(),
            },
        );
        debug!(collection, dimension, "Created collection");
        Ok(())
    }

    #[instrument(skip(self, points), fields(subsystem = "vector", component = "memory", op = "upsert", input_count = points.len()))]
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dimension) {
            return Err(Error::VectorStore(format!(
                "vector dimension {} does not match collection dimension {}",
                bad.vector.len(),
                target.dimension
            )));
        }

        let count = points.len();
        for point in points {
            target.points.insert(point.id, point);
        }
        Ok(count)
    }

    #[instrument(skip(self, vector), fields(subsystem = "vector", component = "memory", op = "query"))]
    async fn query(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<QueryHit>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if vector.len() != target.dimension {
            return Err(Error::VectorStore(format!(
                "query dimension {} does not match collection dimension {}",
                vector.len(),
                target.dimension
            )));
        }

        let mut hits: Vec<QueryHit> = target
            .points
            .values()
            .map(|p| QueryHit {
                score: cosine_similarity(vector, &p.vector),
                metadata: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);

        debug!(result_count = hits.len(), "Query complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::Metadata;
    use serde_json::json;

    fn point(vector: Vec<f32>, source: &str) -> VectorPoint {
        let mut payload = Metadata::new();
        payload.insert("source".to_string(), json!(source));
        VectorPoint::new(vector, payload)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_create_collection_twice_conflicts() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        assert!(store.collection_exists("docs").await.unwrap());

        let err = store.create_collection("docs", 2).await.unwrap_err();
        assert!(matches!(err, Error::CollectionExists(_)));
    }

    #[tokio::test]
    async fn test_ensure_collection_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store.ensure_collection("docs", 2).await.unwrap();
        assert_eq!(store.point_count("docs").await, Some(0));
    }

    #[tokio::test]
    async fn test_query_ranks_descending_with_limit() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        let inserted = store
            .upsert(
                "docs",
                vec![
                    point(vec![0.0, 1.0], "far"),
                    point(vec![1.0, 0.0], "exact"),
                    point(vec![1.0, 1.0], "near"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let hits = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata["source"], "exact");
        assert_eq!(hits[1].metadata["source"], "near");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_query_missing_collection() {
        let store = InMemoryVectorStore::new();
        let err = store.query("nope", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_upsert_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 3).await.unwrap();
        let err = store
            .upsert("docs", vec![point(vec![1.0], "short")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VectorStore(_)));
        assert_eq!(store.point_count("docs").await, Some(0));
    }

    #[tokio::test]
    async fn test_upsert_same_id_replaces() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 1).await.unwrap();
        let mut p = point(vec![1.0], "v1");
        store.upsert("docs", vec![p.clone()]).await.unwrap();
        p.payload.insert("source".to_string(), json!("v2"));
        store.upsert("docs", vec![p]).await.unwrap();

        assert_eq!(store.point_count("docs").await, Some(1));
        let hits = store.query("docs", &[1.0], 5).await.unwrap();
        assert_eq!(hits[0].metadata["source"], "v2");
    }
}
