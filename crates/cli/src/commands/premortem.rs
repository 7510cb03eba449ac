//! `engram premortem`: Warnings document for work in a domain.

use engram_context::StaticSource;
use engram_core::axis::Axis;
use engram_core::candidate::{CandidateItem, SourceKind};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::{load_config, print_json};
use crate::container::AppServices;

/// Read a JSON object of pools keyed by axis name or `values`.
pub fn read_premortem_pools(path: &Path) -> Result<StaticSource, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let pools: BTreeMap<String, Vec<CandidateItem>> = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;

    let mut values = Vec::new();
    let mut axes = Vec::new();
    for (key, items) in pools {
        if key == "values" {
            values = items
                .into_iter()
                .map(|mut item| {
                    item.kind = SourceKind::Value;
                    item
                })
                .collect();
        } else {
            axes.push((key.parse::<Axis>()?, items));
        }
    }

    Ok(axes
        .into_iter()
        .fold(StaticSource::from_items(values), |source, (axis, items)| {
            source.with_axis(axis, items)
        }))
}

pub async fn run(
    config_path: Option<&Path>,
    pools: &Path,
    domain: &str,
    strategy: Option<&str>,
    limit: Option<usize>,
    max_tokens: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let limit = limit.unwrap_or(config.context.default_limit);
    let max_tokens = max_tokens.unwrap_or(config.context.default_max_tokens);

    let source = read_premortem_pools(pools)?;
    let services = AppServices::from_config(config)?;
    let assembled = services
        .context_service(Arc::new(source))
        .premortem_context(domain, strategy, limit, max_tokens)
        .await?;

    print_json(&assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_context::CandidateSource;

    #[tokio::test]
    async fn reads_axis_and_value_pools() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("premortem.json");
        std::fs::write(
            &file,
            r#"{
                "root_cause": [{"id": "r1", "kind": "experience", "content": "Stale cache"}],
                "values": [{"id": "v1", "kind": "memory", "content": "Invalidate on write"}]
            }"#,
        )
        .unwrap();

        let source = read_premortem_pools(&file).unwrap();
        let roots = source.fetch_axis(Axis::RootCause, "q", 10).await.unwrap();
        assert_eq!(roots[0].id, "r1");
        let values = source.fetch(SourceKind::Value, "q", 10).await.unwrap();
        assert_eq!(values[0].kind, SourceKind::Value);
    }

    #[test]
    fn unknown_pool_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("premortem.json");
        std::fs::write(&file, r#"{"history": []}"#).unwrap();
        let err = read_premortem_pools(&file).unwrap_err();
        assert!(err.to_string().contains("Invalid axis 'history'"));
    }
}
