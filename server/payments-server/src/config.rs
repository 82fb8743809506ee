//! Layered configuration: built-in defaults, an optional file, then
//! `PAYMENTS__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use payments_service::PaymentsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

pub const ENV_PREFIX: &str = "PAYMENTS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    /// Organization to processor customer mapping, loaded into the ledger at startup.
    pub customers: HashMap<Uuid, String>,
    pub sandbox: SandboxConfig,
    #[serde(flatten)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Payment methods known to the sandbox processor, keyed by id, valued by owning customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub payment_methods: HashMap<String, String>,
}

impl AppConfig {
    /// Loads configuration. A file path with a `.yaml`/`.yml`/`.toml`/`.json`
    /// extension is read in that format; a missing file is an error only when
    /// a path was given explicitly.
    ///
    /// # Errors
    ///
    /// Returns the `config` crate's error when a source cannot be read or the
    /// merged values do not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
