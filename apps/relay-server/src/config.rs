//! Server configuration.
//!
//! Supports loading a [`RelayConfig`] from a YAML file, with environment
//! variable overrides for the values an operator most commonly needs to
//! change without editing the file (currently just the bind port).

use std::path::Path;

use anyhow::{Context, Result};
use relay_core::RelayConfig;

/// Loads configuration from a YAML file, falling back to defaults (no mounts
/// configured) if no path is given, then applies environment overrides.
pub fn load(path: Option<&Path>) -> Result<RelayConfig> {
    let mut config = if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?
    } else {
        RelayConfig::default()
    };

    apply_env_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn apply_env_overrides(config: &mut RelayConfig) {
    if let Ok(val) = std::env::var("RELAY_BIND_PORT") {
        if let Ok(port) = val.parse() {
            config.bind_port = port;
        }
    }
    if let Ok(val) = std::env::var("RELAY_LISTENER_LIMIT") {
        if let Ok(limit) = val.parse() {
            config.listener_limit = limit;
        }
    }
    if let Ok(val) = std::env::var("RELAY_SOURCE_LIMIT") {
        if let Ok(limit) = val.parse() {
            config.source_limit = limit;
        }
    }
}
