//! In-memory vector store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use engram_core::error::StoreError;
use engram_core::filter::Filter;
use engram_core::vector_store::{Distance, Payload, Record, VectorStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One stored point. Vectors are always kept; callers choose whether to
/// receive them.
#[derive(Debug, Clone)]
pub(crate) struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

impl Point {
    fn to_record(&self, with_vector: bool) -> Record {
        Record {
            id: self.id.clone(),
            payload: self.payload.clone(),
            vector: with_vector.then(|| self.vector.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Collection {
    pub dimension: usize,
    pub distance: Distance,
    /// Insertion order; upsert replaces in place
    pub points: Vec<Point>,
}

/// Collection state shared by the in-memory and file-backed stores.
#[derive(Debug, Default, Clone)]
pub(crate) struct Collections {
    pub inner: BTreeMap<String, Collection>,
}

impl Collections {
    pub fn create(
        &mut self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        if self.inner.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        if dimension == 0 {
            return Err(StoreError::Storage(format!(
                "collection '{name}' needs a positive dimension"
            )));
        }
        self.inner.insert(
            name.to_string(),
            Collection {
                dimension,
                distance,
                points: Vec::new(),
            },
        );
        Ok(())
    }

    fn collection(&self, name: &str) -> Result<&Collection, StoreError> {
        self.inner
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    pub fn upsert(
        &mut self,
        name: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<(), StoreError> {
        let coll = self
            .inner
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

        if vector.len() != coll.dimension {
            return Err(StoreError::DimensionMismatch {
                collection: name.to_string(),
                expected: coll.dimension,
                actual: vector.len(),
            });
        }

        let point = Point {
            id: id.to_string(),
            vector,
            payload,
        };
        match coll.points.iter_mut().find(|p| p.id == id) {
            Some(existing) => *existing = point,
            None => coll.points.push(point),
        }
        Ok(())
    }

    pub fn get(&self, name: &str, id: &str, with_vector: bool) -> Result<Option<Record>, StoreError> {
        Ok(self
            .collection(name)?
            .points
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.to_record(with_vector)))
    }

    pub fn scroll(
        &self,
        name: &str,
        limit: usize,
        filter: Option<&Filter>,
        with_vectors: bool,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .collection(name)?
            .points
            .iter()
            .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
            .take(limit)
            .map(|p| p.to_record(with_vectors))
            .collect())
    }

    pub fn count(&self, name: &str, filter: Option<&Filter>) -> Result<usize, StoreError> {
        Ok(self
            .collection(name)?
            .points
            .iter()
            .filter(|p| filter.is_none_or(|f| f.matches(&p.payload)))
            .count())
    }

    pub fn delete(&mut self, name: &str, id: &str) -> Result<bool, StoreError> {
        let coll = self
            .inner
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;
        let len_before = coll.points.len();
        coll.points.retain(|p| p.id != id);
        Ok(coll.points.len() < len_before)
    }
}

/// A vector store that keeps every collection in process memory.
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(Collections::default())),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        self.collections.write().await.create(name, dimension, distance)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .upsert(collection, id, vector, payload)
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
        with_vector: bool,
    ) -> Result<Option<Record>, StoreError> {
        self.collections.read().await.get(collection, id, with_vector)
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        filter: Option<&Filter>,
        with_vectors: bool,
    ) -> Result<Vec<Record>, StoreError> {
        self.collections
            .read()
            .await
            .scroll(collection, limit, filter, with_vectors)
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize, StoreError> {
        self.collections.read().await.count(collection, filter)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.collections.write().await.delete(collection, id)
    }
}
