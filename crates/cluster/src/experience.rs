//! Axis-scoped clustering over the stored experience corpus.
//!
//! Each axis reads its own `experiences_{axis}` collection. Clustering is
//! CPU-bound and runs on the blocking pool.

use engram_core::axis::Axis;
use engram_core::error::{Error, Result, StoreError};
use engram_core::vector_store::VectorStore;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clusterer::{ClusterInfo, Clusterer};
use crate::types::experience_weight;

pub struct ExperienceClusterer {
    store: Arc<dyn VectorStore>,
    clusterer: Arc<Clusterer>,
    scroll_limit: usize,
}

impl ExperienceClusterer {
    pub fn new(store: Arc<dyn VectorStore>, clusterer: Clusterer, scroll_limit: usize) -> Self {
        Self {
            store,
            clusterer: Arc::new(clusterer),
            scroll_limit,
        }
    }

    /// Experiences stored for `axis`; a missing collection counts as zero.
    pub async fn count_experiences(&self, axis: Axis) -> Result<usize> {
        match self.store.count(&axis.collection(), None).await {
            Ok(n) => Ok(n),
            Err(StoreError::CollectionNotFound(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Cluster one axis. Returns `[]` when every point is noise.
    pub async fn cluster_axis(&self, axis: Axis) -> Result<Vec<ClusterInfo>> {
        let collection = axis.collection();
        let no_embeddings = || {
            Error::NotFound(format!(
                "No embeddings found for axis '{axis}' (collection: {collection})"
            ))
        };

        let records = match self
            .store
            .scroll(&collection, self.scroll_limit, None, true)
            .await
        {
            Ok(records) => records,
            Err(StoreError::CollectionNotFound(_)) => return Err(no_embeddings()),
            Err(e) => return Err(e.into()),
        };

        if records.len() >= self.scroll_limit {
            warn!(
                axis = %axis,
                collection = %collection,
                count = records.len(),
                "Scroll limit reached, clustering a partial corpus"
            );
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut embeddings = Vec::with_capacity(records.len());
        let mut weights = Vec::with_capacity(records.len());
        for record in records {
            let Some(vector) = record.vector else {
                warn!(axis = %axis, id = %record.id, "Experience stored without a vector, skipping");
                continue;
            };
            weights.push(experience_weight(&record.payload));
            embeddings.push(vector);
            ids.push(record.id);
        }
        if embeddings.is_empty() {
            return Err(no_embeddings());
        }

        let total_points = embeddings.len();
        let clusterer = Arc::clone(&self.clusterer);
        let outcome = tokio::task::spawn_blocking(move || -> Result<(usize, Vec<ClusterInfo>)> {
            let result = clusterer.cluster(&embeddings, Some(&weights))?;
            if result.n_clusters == 0 {
                return Ok((result.noise_count, Vec::new()));
            }
            let clusters =
                Clusterer::compute_centroids(&embeddings, &result.labels, &ids, Some(&weights))?;
            Ok((result.noise_count, clusters))
        })
        .await
        .map_err(|e| Error::Internal(format!("clustering task failed: {e}")))?;
        let (noise_count, clusters) = outcome?;

        if clusters.is_empty() {
            warn!(axis = %axis, total_points, noise_count, "All points classified as noise");
        } else {
            info!(
                axis = %axis,
                n_clusters = clusters.len(),
                total_points,
                noise_count,
                "Clustering complete"
            );
        }
        Ok(clusters)
    }

    /// Cluster every axis concurrently. Axes that fail are skipped.
    pub async fn cluster_all_axes(&self) -> BTreeMap<Axis, Vec<ClusterInfo>> {
        let runs = Axis::ALL
            .iter()
            .map(|&axis| async move { (axis, self.cluster_axis(axis).await) });

        let mut out = BTreeMap::new();
        for (axis, result) in join_all(runs).await {
            match result {
                Ok(clusters) => {
                    out.insert(axis, clusters);
                }
                Err(e) => warn!(axis = %axis, error = %e, "Axis skipped"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdbscan::HdbscanParams;
    use engram_core::vector_store::{Distance, Payload};
    use engram_memory::InMemoryVectorStore;
    use serde_json::json;

    const DIM: usize = 16;

    fn blob_point(axis_dim: usize, k: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[axis_dim] = 1.0;
        v[k] = 0.05;
        v
    }

    fn payload(tier: &str) -> Payload {
        let mut p = Payload::new();
        p.insert("confidence_tier".into(), json!(tier));
        p
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        let full = Axis::Full.collection();
        store.create_collection(&full, DIM, Distance::Cosine).await.unwrap();
        for k in 2..8 {
            store
                .upsert(&full, &format!("a{k}"), blob_point(0, k), payload("gold"))
                .await
                .unwrap();
        }
        for k in 8..14 {
            store
                .upsert(&full, &format!("b{k}"), blob_point(1, k), payload("bronze"))
                .await
                .unwrap();
        }

        let strategy = Axis::Strategy.collection();
        store.create_collection(&strategy, DIM, Distance::Cosine).await.unwrap();
        for k in 2..5 {
            store
                .upsert(&strategy, &format!("s{k}"), blob_point(0, k), Payload::new())
                .await
                .unwrap();
        }
        store
    }

    fn experience_clusterer(store: Arc<InMemoryVectorStore>) -> ExperienceClusterer {
        ExperienceClusterer::new(
            store,
            Clusterer::new(HdbscanParams::default()).unwrap(),
            10_000,
        )
    }

    #[tokio::test]
    async fn counts_per_axis() {
        let ec = experience_clusterer(seeded_store().await);
        assert_eq!(ec.count_experiences(Axis::Full).await.unwrap(), 12);
        assert_eq!(ec.count_experiences(Axis::Strategy).await.unwrap(), 3);
        assert_eq!(ec.count_experiences(Axis::Surprise).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clusters_full_axis() {
        let ec = experience_clusterer(seeded_store().await);
        let clusters = ec.cluster_axis(Axis::Full).await.unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, 6);
        assert_eq!(clusters[1].size, 6);
        let gold = clusters
            .iter()
            .find(|c| c.member_ids.contains(&"a2".to_string()))
            .unwrap();
        assert!(gold.member_ids.iter().all(|id| id.starts_with('a')));
        assert_eq!(gold.avg_weight, 1.0);
        assert!(gold.centroid[0] > 0.9);
    }

    #[tokio::test]
    async fn sparse_axis_returns_empty() {
        let ec = experience_clusterer(seeded_store().await);
        assert!(ec.cluster_axis(Axis::Strategy).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_axis_is_an_error() {
        let ec = experience_clusterer(seeded_store().await);
        let err = ec.cluster_axis(Axis::RootCause).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains("experiences_root_cause"));
    }

    #[tokio::test]
    async fn all_axes_skips_failures() {
        let ec = experience_clusterer(seeded_store().await);
        let all = ec.cluster_all_axes().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[&Axis::Full].len(), 2);
        assert!(all[&Axis::Strategy].is_empty());
        assert!(!all.contains_key(&Axis::Surprise));
    }
}
