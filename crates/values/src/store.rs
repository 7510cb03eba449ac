//! Value store: cluster resolution, validation and persistence.

use chrono::Utc;
use engram_cluster::ExperienceClusterer;
use engram_cluster::types::experience_weight;
use engram_config::ValuesConfig;
use engram_core::axis::{Axis, parse_cluster_id};
use engram_core::embedding::Embedder;
use engram_core::error::{EmbeddingError, Error, Result, StoreError, ValidationError};
use engram_core::filter::{CollectionSchema, Filter};
use engram_core::vector_store::{Payload, VectorStore};
use engram_memory::CollectionRegistry;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{AxisCluster, Experience, ValidationResult, Value};
use crate::validator::evaluate_candidate;

pub const VALUES_COLLECTION: &str = "values";

/// A candidate that resolved and was scored.
struct Assessment {
    result: ValidationResult,
    cluster: AxisCluster,
    embedding: Vec<f32>,
}

pub struct ValueStore {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    clusterer: Arc<ExperienceClusterer>,
    registry: Arc<CollectionRegistry>,
    config: ValuesConfig,
}

impl ValueStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        clusterer: Arc<ExperienceClusterer>,
        registry: Arc<CollectionRegistry>,
        config: ValuesConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            clusterer,
            registry,
            config,
        }
    }

    /// Clusters on `axis`, largest first.
    ///
    /// Fails with [`Error::InsufficientData`] below the configured
    /// population.
    pub async fn get_clusters(&self, axis: Axis) -> Result<Vec<AxisCluster>> {
        let found = self.clusterer.count_experiences(axis).await?;
        if found < self.config.min_experiences {
            return Err(Error::InsufficientData {
                axis: axis.to_string(),
                found,
                required: self.config.min_experiences,
            });
        }

        let mut clusters: Vec<AxisCluster> = self
            .clusterer
            .cluster_axis(axis)
            .await?
            .into_iter()
            .map(|c| AxisCluster {
                cluster_id: axis.cluster_id(c.label),
                axis,
                label: c.label,
                centroid: c.centroid,
                member_ids: c.member_ids,
                size: c.size,
                avg_weight: c.avg_weight,
            })
            .collect();
        clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.label.cmp(&b.label)));
        Ok(clusters)
    }

    /// Resolve one cluster by id.
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<AxisCluster> {
        let (axis, _) = parse_cluster_id(cluster_id)?;
        self.get_clusters(axis)
            .await?
            .into_iter()
            .find(|c| c.cluster_id == cluster_id)
            .ok_or_else(|| Error::NotFound(format!("Cluster not found: {cluster_id}")))
    }

    /// Members of a cluster, read back with their vectors.
    pub async fn get_cluster_members(&self, cluster_id: &str) -> Result<Vec<Experience>> {
        let cluster = self.get_cluster(cluster_id).await?;
        self.members_of(&cluster).await
    }

    async fn members_of(&self, cluster: &AxisCluster) -> Result<Vec<Experience>> {
        let collection = cluster.axis.collection();
        let mut members = Vec::with_capacity(cluster.member_ids.len());
        for id in &cluster.member_ids {
            let record = self
                .storage("get", self.store.get(&collection, id, true))
                .await?;
            let Some(record) = record else {
                debug!(cluster_id = %cluster.cluster_id, id = %id, "Member missing from store");
                continue;
            };
            let Some(embedding) = record.vector else {
                continue;
            };
            members.push(Experience {
                weight: experience_weight(&record.payload),
                id: record.id,
                embedding,
                payload: record.payload,
            });
        }
        Ok(members)
    }

    /// Check a candidate against a cluster.
    ///
    /// Resolution problems come back as a failed result with a reason;
    /// embedding and storage failures are errors.
    pub async fn validate_value_candidate(
        &self,
        text: &str,
        cluster_id: &str,
    ) -> Result<ValidationResult> {
        Ok(match self.assess(text, cluster_id).await? {
            Ok(assessment) => assessment.result,
            Err(rejected) => rejected,
        })
    }

    async fn assess(
        &self,
        text: &str,
        cluster_id: &str,
    ) -> Result<std::result::Result<Assessment, ValidationResult>> {
        let resolved = async {
            let cluster = self.get_cluster(cluster_id).await?;
            let members = self.members_of(&cluster).await?;
            Ok::<_, Error>((cluster, members))
        }
        .await;
        let (cluster, members) = match resolved {
            Ok(r) => r,
            Err(e) if is_resolution_failure(&e) => {
                debug!(cluster_id, reason = %e, "Cluster resolution failed");
                return Ok(Err(ValidationResult::rejected(resolution_reason(e))));
            }
            Err(e) => return Err(e),
        };
        if members.is_empty() {
            return Ok(Err(ValidationResult::rejected("Cluster has no members")));
        }

        let embedding = self.embed(text).await?;
        let member_vectors: Vec<Vec<f32>> = members.into_iter().map(|m| m.embedding).collect();
        let result = evaluate_candidate(
            &embedding,
            &cluster.centroid,
            &member_vectors,
            self.config.std_multiplier,
        );

        debug!(
            cluster_id,
            valid = result.valid,
            distance = result.candidate_distance,
            threshold = result.threshold,
            "Candidate evaluated"
        );
        Ok(Ok(Assessment {
            result,
            cluster,
            embedding,
        }))
    }

    /// Validate and persist a value. Fails if the candidate is rejected.
    pub async fn store_value(&self, text: &str, cluster_id: &str, axis: Axis) -> Result<Value> {
        let (id_axis, _) = parse_cluster_id(cluster_id)?;
        if id_axis != axis {
            return Err(ValidationError::AxisMismatch {
                given: axis.to_string(),
                cluster_id: cluster_id.to_string(),
            }
            .into());
        }

        self.ensure_values_collection().await?;

        let assessment = match self.assess(text, cluster_id).await? {
            Ok(a) if a.result.valid => a,
            Ok(a) => return Err(rejection(a.result)),
            Err(rejected) => return Err(rejection(rejected)),
        };
        let Assessment {
            result,
            cluster,
            embedding,
        } = assessment;

        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let id = format!("value_{axis}_{}_{suffix}", cluster.label);
        let created_at = Utc::now();
        let provenance = result.provenance();

        let payload = json!({
            "text": text,
            "cluster_id": cluster_id,
            "axis": axis.as_str(),
            "cluster_label": cluster.label,
            "cluster_size": cluster.size,
            "created_at": created_at.to_rfc3339(),
            "validation": provenance,
        });
        let payload: Payload = match payload {
            serde_json::Value::Object(map) => map,
            _ => return Err(Error::Internal("value payload is not an object".into())),
        };

        let upserted = self
            .storage(
                "upsert",
                self.store
                    .upsert(VALUES_COLLECTION, &id, embedding.clone(), payload.clone()),
            )
            .await;
        match upserted {
            // The collection was dropped behind a stale ready flag
            Err(StoreError::CollectionNotFound(_)) => {
                warn!(collection = VALUES_COLLECTION, "Values collection missing, recreating");
                self.registry.invalidate(VALUES_COLLECTION);
                self.ensure_values_collection().await?;
                self.storage(
                    "upsert",
                    self.store
                        .upsert(VALUES_COLLECTION, &id, embedding.clone(), payload),
                )
                .await?;
            }
            other => other?,
        }

        info!(
            value_id = %id,
            cluster_id,
            cluster_size = cluster.size,
            "Value stored"
        );

        Ok(Value {
            id,
            text: text.to_string(),
            cluster_id: cluster_id.to_string(),
            axis,
            embedding,
            cluster_size: cluster.size,
            created_at,
            metadata: provenance,
        })
    }

    /// Stored values, newest first, optionally restricted to one axis.
    pub async fn list_values(&self, axis: Option<&str>) -> Result<Vec<Value>> {
        let axis: Option<Axis> = axis.map(str::parse::<Axis>).transpose()?;
        let filter = axis.map(|a| Filter::new().eq("axis", a.as_str()));
        if let Some(f) = &filter {
            CollectionSchema::values().validate(f)?;
        }

        let scrolled = self
            .storage(
                "scroll",
                self.store.scroll(
                    VALUES_COLLECTION,
                    self.config.list_limit,
                    filter.as_ref(),
                    true,
                ),
            )
            .await;
        let records = match scrolled {
            Ok(records) => records,
            Err(StoreError::CollectionNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut values: Vec<Value> = records
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                let value = Value::from_record(record);
                if value.is_none() {
                    warn!(id = %id, "Skipping malformed value record");
                }
                value
            })
            .collect();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(values)
    }

    async fn ensure_values_collection(&self) -> Result<()> {
        self.storage(
            "create_collection",
            self.registry
                .ensure(self.store.as_ref(), VALUES_COLLECTION, self.embedder.dimension()),
        )
        .await?;
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let timeout_ms = self.config.embedding_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.embedder.embed(text))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(EmbeddingError::Timeout { timeout_ms }.into()),
        }
    }

    async fn storage<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        let timeout_ms = self.config.storage_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), fut)
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms,
                })
            })
    }
}

fn is_resolution_failure(e: &Error) -> bool {
    matches!(
        e,
        Error::Validation(_) | Error::InsufficientData { .. } | Error::NotFound(_)
    )
}

/// The reason text without the error-kind prefix.
fn resolution_reason(e: Error) -> String {
    match e {
        Error::Validation(v) => v.to_string(),
        Error::NotFound(msg) => msg,
        other => other.to_string(),
    }
}

fn rejection(result: ValidationResult) -> Error {
    Error::ValueRejected {
        reason: result.reason.unwrap_or_else(|| "unknown reason".into()),
    }
}
