//! Configuration loader and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.bluebox/` in production)
//! and deserializes it into [`BlueboxConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use bluebox_types::config::BlueboxConfig;

use crate::sqlite::pool::default_database_url;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "BLUEBOX_DATA_DIR";

/// Environment variable overriding `[generation] endpoint`.
pub const ENDPOINT_ENV: &str = "BLUEBOX_ENDPOINT";

/// Resolve the data directory.
///
/// Priority:
/// 1. `BLUEBOX_DATA_DIR`
/// 2. `~/.bluebox`
/// 3. `./.bluebox`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".bluebox");
    }

    PathBuf::from(".bluebox")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: a warning, then defaults.
pub async fn load_config(data_dir: &Path) -> BlueboxConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return BlueboxConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return BlueboxConfig::default();
        }
    };

    match toml::from_str::<BlueboxConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            BlueboxConfig::default()
        }
    }
}

/// Apply `BLUEBOX_ENDPOINT` on top of the file configuration.
pub fn apply_env_overrides(config: BlueboxConfig) -> BlueboxConfig {
    override_endpoint(config, std::env::var(ENDPOINT_ENV).ok())
}

fn override_endpoint(mut config: BlueboxConfig, endpoint: Option<String>) -> BlueboxConfig {
    if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
        tracing::debug!(endpoint = %endpoint, "generation endpoint overridden from environment");
        config.generation.endpoint = endpoint;
    }
    config
}

/// The configured database URL, or `bluebox.db` inside the data directory.
pub fn database_url(config: &BlueboxConfig, data_dir: &Path) -> String {
    config
        .storage
        .database_url
        .clone()
        .unwrap_or_else(|| default_database_url(data_dir))
}
