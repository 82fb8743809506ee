//! Secrets manager that bounds provider reads with a timeout

use crate::{
    config::{ProviderConfig, SecretsConfig},
    providers::{EnvSecretProvider, StaticSecretProvider},
    Result, SecretProvider, SecretsError,
};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SecretsManager {
    provider: Arc<dyn SecretProvider>,
    timeout: Duration,
}

impl SecretsManager {
    pub fn new(provider: Arc<dyn SecretProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn from_config(config: &SecretsConfig) -> Self {
        let provider: Arc<dyn SecretProvider> = match &config.provider {
            ProviderConfig::Environment(env) => {
                info!(prefix = %env.prefix, "Initializing environment secrets provider");
                Arc::new(EnvSecretProvider::new(env.clone()))
            }
            ProviderConfig::Static(values) => {
                info!("Initializing static secrets provider");
                Arc::new(StaticSecretProvider::new(values.clone()))
            }
        };
        Self::new(provider, Duration::from_millis(config.timeout_ms))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Reads a secret, giving up after the configured timeout.
    ///
    /// # Errors
    ///
    /// Propagates provider errors; returns [`SecretsError::TimeoutError`] if the
    /// provider does not answer in time.
    pub async fn get_secret(&self, path: &str, key: &str) -> Result<SecretString> {
        debug!(provider = self.provider.name(), path, key, "Fetching secret");
        match tokio::time::timeout(self.timeout, self.provider.get_secret(path, key)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(provider = self.provider.name(), path, key, "Secret read timed out");
                Err(SecretsError::TimeoutError(format!(
                    "{path}/{key} after {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
