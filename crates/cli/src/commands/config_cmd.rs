//! `engram config`: Configuration management commands.

use engram_config::AppConfig;
use std::path::{Path, PathBuf};

use super::load_config;

fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub async fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.storage.backend == "memory" {
                warnings.push("storage.backend = \"memory\": nothing persists between runs");
            }
            if config.values.min_experiences < config.clustering.min_cluster_size {
                warnings.push("values.min_experiences is below clustering.min_cluster_size");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Storage:    {} ({})", config.storage.backend, config.storage.path.display());
            println!(
                "   Embedding:  {} (dim {})",
                config.embedding.provider, config.embedding.dimension
            );
            println!(
                "   Clustering: min_cluster_size={}, min_samples={}, {}",
                config.clustering.min_cluster_size,
                config.clustering.min_samples,
                config.clustering.selection_method
            );
            println!(
                "   Values:     min_experiences={}, std_multiplier={}",
                config.values.min_experiences, config.values.std_multiplier
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_file(path).display());
    Ok(())
}

pub async fn init(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let file = config_file(path);
    if file.exists() {
        println!("Config already exists at {}", file.display());
        return Ok(());
    }
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&file, AppConfig::default_toml())?;
    println!("✅ Wrote default config to {}", file.display());
    Ok(())
}
