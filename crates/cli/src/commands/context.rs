//! `engram context`: Assemble a context document from candidate pools.

use engram_context::StaticSource;
use engram_core::candidate::CandidateItem;
use std::path::Path;
use std::sync::Arc;

use super::{load_config, print_json};
use crate::container::AppServices;

/// Read a JSON array of candidate items.
pub fn read_pools(path: &Path) -> Result<Vec<CandidateItem>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let items: Vec<CandidateItem> = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
    Ok(items)
}

pub async fn run(
    config_path: Option<&Path>,
    pools: &Path,
    query: &str,
    categories: &[String],
    limit: Option<usize>,
    max_tokens: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let limit = limit.unwrap_or(config.context.default_limit);
    let max_tokens = max_tokens.unwrap_or(config.context.default_max_tokens);

    let items = read_pools(pools)?;
    tracing::debug!(items = items.len(), "Candidate pools loaded");

    let services = AppServices::from_config(config)?;
    let service = services.context_service(Arc::new(StaticSource::from_items(items)));
    let assembled = service
        .assemble_context(query, categories, limit, max_tokens)
        .await?;

    print_json(&assembled)
}
