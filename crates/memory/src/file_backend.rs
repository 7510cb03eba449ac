//! File-based vector store: persistent JSON-lines snapshot.
//!
//! Each line is one JSON object: either a collection header or a point
//! belonging to a previously declared collection.
//!
//! Storage location: `~/.engram/store.json` (configurable)
//!
//! Everything is loaded into memory on creation and the whole snapshot is
//! rewritten on every mutation. Reads never touch the disk.

use async_trait::async_trait;
use engram_core::error::StoreError;
use engram_core::filter::Filter;
use engram_core::vector_store::{Distance, Payload, Record, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::in_memory::{Collection, Collections, Point};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line {
    Collection {
        name: String,
        dimension: usize,
        #[serde(default)]
        distance: Distance,
    },
    Point {
        collection: String,
        id: String,
        vector: Vec<f32>,
        #[serde(default)]
        payload: Payload,
    },
}

/// A file-backed vector store using JSONL.
pub struct FileVectorStore {
    path: PathBuf,
    collections: Arc<RwLock<Collections>>,
}

impl FileVectorStore {
    /// Open a store at the given path.
    ///
    /// If the file exists, collections are loaded from it.
    /// If the file does not exist, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let collections = Self::load_from_disk(&path);
        debug!(
            path = %path.display(),
            collections = collections.inner.len(),
            "File vector store loaded"
        );
        Self {
            path,
            collections: Arc::new(RwLock::new(collections)),
        }
    }

    fn load_from_disk(path: &Path) -> Collections {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Collections::default(), // File doesn't exist yet
        };

        let mut collections = Collections::default();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<Line>(line) {
                Ok(Line::Collection {
                    name,
                    dimension,
                    distance,
                }) => {
                    collections.inner.insert(
                        name,
                        Collection {
                            dimension,
                            distance,
                            points: Vec::new(),
                        },
                    );
                }
                Ok(Line::Point {
                    collection,
                    id,
                    vector,
                    payload,
                }) => {
                    let point = Point {
                        id,
                        vector,
                        payload,
                    };
                    let Some(coll) = collections.inner.get_mut(&collection) else {
                        warn!(collection = %collection, id = %point.id, "Skipping point for undeclared collection");
                        continue;
                    };
                    if point.vector.len() != coll.dimension {
                        warn!(collection = %collection, id = %point.id, "Skipping point with wrong dimension");
                        continue;
                    }
                    coll.points.push(point);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted store line");
                }
            }
        }
        collections
    }

    /// Rewrite the snapshot. Called with the write guard held so
    /// concurrent mutations cannot reorder on disk.
    fn flush(&self, collections: &Collections) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for (name, coll) in &collections.inner {
            let header = Line::Collection {
                name: name.clone(),
                dimension: coll.dimension,
                distance: coll.distance,
            };
            push_line(&mut content, &header)?;
            for point in &coll.points {
                let line = Line::Point {
                    collection: name.clone(),
                    id: point.id.clone(),
                    vector: point.vector.clone(),
                    payload: point.payload.clone(),
                };
                push_line(&mut content, &line)?;
            }
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))
    }
}

fn push_line(content: &mut String, line: &Line) -> Result<(), StoreError> {
    let json = serde_json::to_string(line)
        .map_err(|e| StoreError::Storage(format!("Failed to serialize store line: {e}")))?;
    content.push_str(&json);
    content.push('\n');
    Ok(())
}

#[async_trait]
impl VectorStore for FileVectorStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.create(name, dimension, distance)?;
        self.flush(&collections)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Payload,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.upsert(collection, id, vector, payload)?;
        self.flush(&collections)
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
        let mut collections = self.collections.write().await;
        let deleted = collections.delete(collection, id)?;
        if deleted {
            self.flush(&collections)?;
        }
        Ok(deleted)
    }
}
