//! VectorStore trait: named collections of vectors with JSON payloads.
//!
//! Implementations: in-memory (for testing) and a file-backed JSON
//! snapshot. "Collection already exists" is a distinct error so callers
//! can create collections idempotently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::filter::Filter;

/// Arbitrary JSON object attached to a point.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Distance metric of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    #[default]
    Cosine,
}

/// A stored point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,

    #[serde(default)]
    pub payload: Payload,

    /// Present only when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Create a collection. Fails with [`StoreError::CollectionExists`]
    /// if it is already there.
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> std::result::Result<(), StoreError>;

    /// Insert or replace a point.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> std::result::Result<(), StoreError>;

    /// Fetch a point by ID.
    async fn get(
        &self,
        collection: &str,
        id: &str,
        with_vector: bool,
    ) -> std::result::Result<Option<Record>, StoreError>;

    /// Up to `limit` points matching `filter`, in insertion order.
    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        filter: Option<&Filter>,
        with_vectors: bool,
    ) -> std::result::Result<Vec<Record>, StoreError>;

    /// Count points matching `filter`.
    async fn count(
        &self,
        collection: &str,
        filter: Option<&Filter>,
    ) -> std::result::Result<usize, StoreError>;

    /// Delete a point. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> std::result::Result<bool, StoreError>;
}
