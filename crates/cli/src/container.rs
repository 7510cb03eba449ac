//! Dependency container: builds the collaborators once per process.

use engram_cluster::{Clusterer, ExperienceClusterer};
use engram_config::AppConfig;
use engram_context::{CandidateSource, ContextService};
use engram_core::embedding::Embedder;
use engram_core::error::{Error, Result};
use engram_core::vector_store::VectorStore;
use engram_memory::{CollectionRegistry, FileVectorStore, HashEmbedder, InMemoryVectorStore};
use engram_values::ValueStore;
use std::sync::Arc;

pub struct AppServices {
    pub config: AppConfig,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub registry: Arc<CollectionRegistry>,
    pub clusterer: Arc<ExperienceClusterer>,
    pub values: ValueStore,
}

impl AppServices {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn VectorStore> = match config.storage.backend.as_str() {
            "file" => Arc::new(FileVectorStore::new(config.storage.path.clone())),
            "memory" => Arc::new(InMemoryVectorStore::new()),
            other => {
                return Err(Error::Config {
                    message: format!("unknown storage backend '{other}'"),
                });
            }
        };

        let embedder: Arc<dyn Embedder> = match config.embedding.provider.as_str() {
            "hash" => Arc::new(HashEmbedder::new(config.embedding.dimension)),
            other => {
                return Err(Error::Config {
                    message: format!("unknown embedding provider '{other}'"),
                });
            }
        };

        let registry = Arc::new(CollectionRegistry::new());
        let clusterer = Arc::new(ExperienceClusterer::new(
            Arc::clone(&store),
            Clusterer::from_config(&config.clustering)?,
            config.clustering.scroll_limit,
        ));
        let values = ValueStore::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            Arc::clone(&clusterer),
            Arc::clone(&registry),
            config.values.clone(),
        );

        tracing::debug!(
            backend = %config.storage.backend,
            embedder = embedder.name(),
            dimension = embedder.dimension(),
            "Services ready"
        );

        Ok(Self {
            config,
            store,
            embedder,
            registry,
            clusterer,
            values,
        })
    }

    pub fn context_service(&self, source: Arc<dyn CandidateSource>) -> ContextService {
        ContextService::new(source, self.config.context.clone())
    }
}
