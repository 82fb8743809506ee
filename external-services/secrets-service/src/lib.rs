//! # Payments Secrets Service
//!
//! Secret retrieval for the payments engine: webhook signing secrets and
//! processor API keys.
//!
//! ## Supported Providers:
//! - Environment Variables
//! - Static values (tests and local sandboxes)
//!
//! Every read through [`SecretsManager`] is bounded by a timeout, so an
//! unresponsive store fails fast instead of stalling a request.

pub mod config;
pub mod error;
pub mod manager;
pub mod providers;

pub use config::*;
pub use error::*;
pub use manager::SecretsManager;
pub use providers::*;

use async_trait::async_trait;
use secrecy::SecretString;

/// Result type for secrets service
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Trait for secret providers
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Get the secret stored under `key` at `path`.
    async fn get_secret(&self, path: &str, key: &str) -> Result<SecretString>;
}
