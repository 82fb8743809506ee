//! Configuration for secrets service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Active provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Upper bound on a single secret read
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Environment(EnvironmentConfig),
    Static(StaticConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Environment(EnvironmentConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_env_prefix")]
    pub prefix: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            prefix: default_env_prefix(),
        }
    }
}

fn default_env_prefix() -> String {
    "PAYMENTS_SECRET".to_string()
}

/// Secrets keyed by `"{path}/{key}"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub values: HashMap<String, String>,
}
