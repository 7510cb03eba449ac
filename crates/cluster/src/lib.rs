//! Density-based clustering of experience embeddings.
//!
//! [`hdbscan`] holds the algorithm, [`Clusterer`] the matrix-level API with
//! weighted centroids, and [`ExperienceClusterer`] reads one axis of the
//! stored corpus and clusters it.

pub mod clusterer;
pub mod experience;
pub mod hdbscan;
pub mod types;

pub use clusterer::{ClusterInfo, ClusterResult, Clusterer};
pub use experience::ExperienceClusterer;
pub use hdbscan::{ClusterSelectionMethod, HdbscanParams};
pub use types::{ConfidenceTier, experience_weight, tier_weight};
