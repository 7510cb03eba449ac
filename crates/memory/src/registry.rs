//! Collection-ready registry.
//!
//! Remembers which collections are known to exist so hot paths skip the
//! create call. Two tasks racing on a cold name both call
//! `create_collection`; the loser sees `CollectionExists`, which counts as
//! ready.

use engram_core::error::StoreError;
use engram_core::vector_store::{Distance, VectorStore};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CollectionRegistry {
    ready: Mutex<HashSet<String>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.ready
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    /// Make sure `name` exists in `store`, creating it on first use.
    pub async fn ensure(
        &self,
        store: &dyn VectorStore,
        name: &str,
        dimension: usize,
    ) -> Result<(), StoreError> {
        if self.is_ready(name) {
            return Ok(());
        }

        match store.create_collection(name, dimension, Distance::Cosine).await {
            Ok(()) => debug!(collection = name, dimension, "Created collection"),
            Err(StoreError::CollectionExists(_)) => {}
            Err(e) => return Err(e),
        }

        self.ready
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string());
        Ok(())
    }

    /// Forget a collection (e.g. after the store was wiped).
    pub fn invalidate(&self, name: &str) {
        self.ready
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryVectorStore;

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = InMemoryVectorStore::new();
        let registry = CollectionRegistry::new();

        registry.ensure(&store, "values", 4).await.unwrap();
        registry.ensure(&store, "values", 4).await.unwrap();
        assert!(registry.is_ready("values"));
        assert_eq!(store.count("values", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn existing_collection_counts_as_ready() {
        let store = InMemoryVectorStore::new();
        store.create_collection("values", 4, Distance::Cosine).await.unwrap();

        let registry = CollectionRegistry::new();
        registry.ensure(&store, "values", 4).await.unwrap();
        assert!(registry.is_ready("values"));
    }

    #[tokio::test]
    async fn invalidate_forces_recheck() {
        let store = InMemoryVectorStore::new();
        let registry = CollectionRegistry::new();
        registry.ensure(&store, "values", 4).await.unwrap();
        registry.invalidate("values");
        assert!(!registry.is_ready("values"));
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let store = InMemoryVectorStore::new();
        let registry = CollectionRegistry::new();
        let err = registry.ensure(&store, "values", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(!registry.is_ready("values"));
    }
}
