//! Error types for the Engram domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them so `?` works across crate boundaries.

use thiserror::Error;

/// The top-level error type for all Engram operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller mistakes, surfaced verbatim ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Too few experiences to cluster an axis ---
    #[error(
        "Not enough experiences for clustering on axis '{axis}': found {found}, need at least {required}"
    )]
    InsufficientData {
        axis: String,
        found: usize,
        required: usize,
    },

    // --- Stale or unknown identifiers ---
    #[error("Not found: {0}")]
    NotFound(String),

    // --- A value candidate failed the consensus gate on store ---
    #[error("Value failed validation: {reason}")]
    ValueRejected { reason: String },

    // --- Collaborator errors ---
    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Clustering error: {0}")]
    Cluster(#[from] ClusterError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that mean "wait for more data" rather than "fix the call".
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// True for caller-side validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unknown context categories: [{}]. Valid: {}", .names.join(", "), .valid.join(", "))]
    UnknownCategories { names: Vec<String>, valid: Vec<String> },

    #[error("Invalid axis '{axis}'. Must be one of: full, strategy, surprise, root_cause")]
    InvalidAxis { axis: String },

    #[error("Invalid cluster_id format: '{0}' (expected '{{axis}}_{{label}}')")]
    InvalidClusterId(String),

    #[error("Axis '{given}' does not match cluster_id '{cluster_id}'")]
    AxisMismatch { given: String, cluster_id: String },

    #[error("{param} {value} out of range. Allowed range: {min}-{max}")]
    OutOfRange {
        param: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector dimension {actual} does not match collection '{collection}' dimension {expected}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding generation failed: {0}")]
    Failed(String),

    #[error("Embedding timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("Embeddings array is empty")]
    EmptyInput,

    #[error("Embeddings must form a 2D matrix: row {row} has {actual} columns, expected {expected}")]
    NotTwoDimensional {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Weights length ({weights}) doesn't match embeddings ({embeddings})")]
    WeightsMismatch { weights: usize, embeddings: usize },

    #[error("Array lengths don't match: embeddings={embeddings}, labels={labels}, ids={ids}")]
    LengthMismatch {
        embeddings: usize,
        labels: usize,
        ids: usize,
    },

    #[error("Cluster {label} has zero total weight")]
    ZeroWeight { label: i64 },

    #[error("Invalid clustering parameter: {0}")]
    InvalidParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_categories_lists_every_offender() {
        let err = Error::from(ValidationError::UnknownCategories {
            names: vec!["notes".into(), "docs".into()],
            valid: vec!["memories".into(), "code".into()],
        });
        let msg = err.to_string();
        assert!(msg.contains("notes"));
        assert!(msg.contains("docs"));
        assert!(msg.contains("memories"));
        assert!(err.is_validation());
    }

    #[test]
    fn insufficient_data_is_distinct_from_validation() {
        let err = Error::InsufficientData {
            axis: "full".into(),
            found: 15,
            required: 20,
        };
        assert!(err.is_insufficient_data());
        assert!(!err.is_validation());
        assert!(err.to_string().contains("found 15"));
        assert!(err.to_string().contains("at least 20"));
    }

    #[test]
    fn store_error_displays_dimensions() {
        let err = Error::Store(StoreError::DimensionMismatch {
            collection: "values".into(),
            expected: 768,
            actual: 384,
        });
        assert!(err.to_string().contains("768"));
        assert!(err.to_string().contains("384"));
    }

    #[test]
    fn out_of_range_displays_bounds() {
        let err = ValidationError::OutOfRange {
            param: "Limit".into(),
            value: 500,
            min: 1,
            max: 100,
        };
        assert_eq!(err.to_string(), "Limit 500 out of range. Allowed range: 1-100");
    }
}
