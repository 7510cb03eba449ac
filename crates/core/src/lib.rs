//! # Engram Core
//!
//! Domain types, collaborator traits, and error definitions for Engram.
//! Its only dependencies are serde, serde_json, thiserror and async-trait;
//! it defines the model every other crate implements against.
//!
//! Collaborators (embedding model, vector store) are traits here.
//! Implementations live in `engram-memory`, so tests and the CLI can swap
//! them freely.

pub mod axis;
pub mod candidate;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod vector_store;

// Re-export key types at crate root for ergonomics
pub use axis::{Axis, parse_cluster_id};
pub use candidate::{CandidateItem, Locator, SourceKind, SourceWeights};
pub use embedding::Embedder;
pub use error::{ClusterError, EmbeddingError, Error, Result, StoreError, ValidationError};
pub use filter::{CollectionSchema, Condition, FieldType, Filter, FilterOp};
pub use vector_store::{Distance, Payload, Record, VectorStore};
