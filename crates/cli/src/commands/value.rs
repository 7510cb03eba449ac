//! `engram value`: Validate, store and list values.

use engram_core::axis::Axis;
use std::path::Path;

use super::{load_config, print_json};
use crate::container::AppServices;

pub async fn validate(
    config_path: Option<&Path>,
    text: &str,
    cluster_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = AppServices::from_config(load_config(config_path)?)?;
    let result = services
        .values
        .validate_value_candidate(text, cluster_id)
        .await?;
    print_json(&result)
}

pub async fn store(
    config_path: Option<&Path>,
    text: &str,
    cluster_id: &str,
    axis: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let axis: Axis = axis.parse()?;
    let services = AppServices::from_config(load_config(config_path)?)?;
    let mut value = services.values.store_value(text, cluster_id, axis).await?;
    value.embedding.clear();
    print_json(&value)
}

pub async fn list(
    config_path: Option<&Path>,
    axis: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = AppServices::from_config(load_config(config_path)?)?;
    let mut values = services.values.list_values(axis).await?;
    for v in &mut values {
        v.embedding.clear();
    }
    print_json(&values)
}
