//! Value-layer records.

use chrono::{DateTime, Utc};
use engram_core::axis::Axis;
use engram_core::vector_store::{Payload, Record};
use serde::{Deserialize, Serialize};

/// Outcome of checking a candidate value against a cluster.
///
/// A resolution failure (bad cluster id, too little data, unknown cluster)
/// carries only `valid = false` and a `reason`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ValidationResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn provenance(&self) -> ValidationProvenance {
        ValidationProvenance {
            candidate_distance: self.candidate_distance,
            mean_distance: self.mean_distance,
            std_distance: self.std_distance,
            threshold: self.threshold,
            similarity: self.similarity,
        }
    }
}

/// Validation numbers persisted with a stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationProvenance {
    pub candidate_distance: Option<f64>,
    pub mean_distance: Option<f64>,
    pub std_distance: Option<f64>,
    pub threshold: Option<f64>,
    pub similarity: Option<f64>,
}

/// A cluster resolved on one axis, addressable as `"{axis}_{label}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisCluster {
    pub cluster_id: String,
    pub axis: Axis,
    pub label: i64,
    pub centroid: Vec<f32>,
    pub member_ids: Vec<String>,
    pub size: usize,
    pub avg_weight: f64,
}

/// A cluster member read back from the experience store.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub id: String,
    pub embedding: Vec<f32>,
    pub payload: Payload,
    pub weight: f32,
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub id: String,
    pub text: String,
    pub cluster_id: String,
    pub axis: Axis,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub cluster_size: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ValidationProvenance,
}

impl Value {
    /// Rebuild a value from a `values` record; `None` if fields are missing.
    pub fn from_record(record: Record) -> Option<Self> {
        let p = &record.payload;
        let text = p.get("text")?.as_str()?.to_string();
        let cluster_id = p.get("cluster_id")?.as_str()?.to_string();
        let axis: Axis = p.get("axis")?.as_str()?.parse().ok()?;
        let cluster_size = usize::try_from(p.get("cluster_size")?.as_u64()?).ok()?;
        let created_at = DateTime::parse_from_rfc3339(p.get("created_at")?.as_str()?)
            .ok()?
            .with_timezone(&Utc);
        let metadata = p
            .get("validation")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Some(Self {
            id: record.id,
            text,
            cluster_id,
            axis,
            embedding: record.vector.unwrap_or_default(),
            cluster_size,
            created_at,
            metadata,
        })
    }
}
