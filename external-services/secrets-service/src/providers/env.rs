//! Environment variable provider

use crate::config::EnvironmentConfig;
use crate::{Result, SecretProvider, SecretsError};
use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

/// Reads `{PREFIX}_{PATH}_{KEY}`, upper-cased with non-alphanumerics mapped to `_`.
///
/// `path = "webhooks/processor", key = "signing_secret"` with the default
/// prefix reads `PAYMENTS_SECRET_WEBHOOKS_PROCESSOR_SIGNING_SECRET`.
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            prefix: config.prefix,
        }
    }

    pub fn variable_name(&self, path: &str, key: &str) -> String {
        format!("{}_{}_{}", self.prefix, path, key)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    fn name(&self) -> &str {
        "environment"
    }

    async fn get_secret(&self, path: &str, key: &str) -> Result<SecretString> {
        let var = self.variable_name(path, key);
        debug!(variable = %var, "Reading secret from environment");
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(SecretString::new(value)),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretsError::NotFound(format!("{path}/{key}"))),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretsError::ProviderError(format!(
                "environment variable {var} is not valid unicode"
            ))),
        }
    }
}
