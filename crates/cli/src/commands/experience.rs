//! `engram experience`: Record and count experiences.

use chrono::Utc;
use engram_cluster::ConfidenceTier;
use engram_core::axis::Axis;
use engram_core::error::Result;
use engram_core::vector_store::Payload;
use serde_json::json;
use std::path::Path;
use uuid::Uuid;

use super::load_config;
use crate::container::AppServices;

/// Embed `text` and store it on `axis`. Returns the experience id.
pub async fn record(
    services: &AppServices,
    axis: Axis,
    text: &str,
    tier: Option<ConfidenceTier>,
    id: Option<String>,
) -> Result<String> {
    let collection = axis.collection();
    services
        .registry
        .ensure(
            services.store.as_ref(),
            &collection,
            services.embedder.dimension(),
        )
        .await?;

    let vector = services.embedder.embed(text).await?;
    let id = id.unwrap_or_else(|| {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
        format!("exp_{suffix}")
    });

    let mut payload = Payload::new();
    payload.insert("text".into(), json!(text));
    payload.insert("axis".into(), json!(axis.as_str()));
    payload.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
    if let Some(tier) = tier {
        payload.insert("confidence_tier".into(), serde_json::to_value(tier)?);
        payload.insert("confidence_weight".into(), json!(tier.weight()));
    }

    services
        .store
        .upsert(&collection, &id, vector, payload)
        .await?;
    tracing::info!(axis = %axis, id = %id, "Experience recorded");
    Ok(id)
}

pub async fn add(
    config_path: Option<&Path>,
    axis: &str,
    text: &str,
    tier: Option<&str>,
    id: Option<String>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let axis: Axis = axis.parse()?;
    let tier = tier.map(str::parse::<ConfidenceTier>).transpose()?;
    let services = AppServices::from_config(load_config(config_path)?)?;

    let id = record(&services, axis, text, tier, id).await?;
    println!("{id}");
    Ok(())
}

pub async fn count(config_path: Option<&Path>, axis: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let axis: Axis = axis.parse()?;
    let services = AppServices::from_config(load_config(config_path)?)?;
    let n = services.clusterer.count_experiences(axis).await?;
    println!("{n}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_config::AppConfig;

    fn services() -> AppServices {
        let mut config = AppConfig::default();
        config.storage.backend = "memory".into();
        config.embedding.dimension = 64;
        AppServices::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn record_stores_tier_and_weight() {
        let services = services();
        let id = record(
            &services,
            Axis::Strategy,
            "bisect the failing commit range",
            Some(ConfidenceTier::Silver),
            Some("exp_1".into()),
        )
        .await
        .unwrap();
        assert_eq!(id, "exp_1");

        let stored = services
            .store
            .get("experiences_strategy", "exp_1", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.payload["confidence_tier"], "silver");
        assert_eq!(stored.vector.unwrap().len(), 64);
        assert_eq!(
            services.clusterer.count_experiences(Axis::Strategy).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let services = services();
        let a = record(&services, Axis::Full, "first attempt", None, None).await.unwrap();
        let b = record(&services, Axis::Full, "second attempt", None, None).await.unwrap();
        assert!(a.starts_with("exp_"));
        assert_ne!(a, b);
    }
}
