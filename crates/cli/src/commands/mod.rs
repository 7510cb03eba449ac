pub mod clusters;
pub mod config_cmd;
pub mod context;
pub mod experience;
pub mod premortem;
pub mod value;

use engram_config::{AppConfig, ConfigError};
use serde::Serialize;
use std::path::Path;

/// Load the config from `path`, or the default location, with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
