//! Configuration types for Bluebox.
//!
//! `BlueboxConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default so an empty file is valid.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueboxConfig {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Capacity of the session event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for BlueboxConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            storage: StorageConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Where and how to reach the generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Transport-level request timeout. The engine itself enforces none.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional bearer token sent with every request. Redacted in `Debug`.
    #[serde(default, skip_serializing)]
    pub api_token: Option<SecretString>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:3000/api/chat".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            api_token: None,
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL. Defaults to `bluebox.db` in the data directory.
    #[serde(default)]
    pub database_url: Option<String>,
}
