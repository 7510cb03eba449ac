//! Collaborator implementations for Engram: vector stores, a deterministic
//! embedder, and cosine math.

pub mod file_backend;
pub mod hash_embedder;
pub mod in_memory;
pub mod registry;
pub mod vector;

pub use file_backend::FileVectorStore;
pub use hash_embedder::HashEmbedder;
pub use in_memory::InMemoryVectorStore;
pub use registry::CollectionRegistry;
pub use vector::{cosine_distance, cosine_similarity};
