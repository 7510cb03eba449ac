//! `engram clusters`: Cluster the experience corpus.

use engram_core::axis::Axis;
use std::path::Path;

use super::{load_config, print_json};
use crate::container::AppServices;

pub async fn run(
    config_path: Option<&Path>,
    axis: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = AppServices::from_config(load_config(config_path)?)?;

    match axis {
        Some(axis) => {
            let axis: Axis = axis.parse()?;
            let clusters = services.values.get_clusters(axis).await?;
            print_json(&clusters)
        }
        None => {
            let all = services.clusterer.cluster_all_axes().await;
            print_json(&all)
        }
    }
}
