//! In-process provider backed by a fixed map

use crate::config::StaticConfig;
use crate::{Result, SecretProvider, SecretsError};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;

pub struct StaticSecretProvider {
    values: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new(config: StaticConfig) -> Self {
        Self { values: config.values }
    }

    pub fn with_secret(mut self, path: &str, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(format!("{path}/{key}"), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_secret(&self, path: &str, key: &str) -> Result<SecretString> {
        let id = format!("{path}/{key}");
        self.values
            .get(&id)
            .map(|v| SecretString::new(v.clone()))
            .ok_or(SecretsError::NotFound(id))
    }
}
