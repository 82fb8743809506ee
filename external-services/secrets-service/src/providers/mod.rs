//! Secret provider implementations

pub mod env;
pub mod fixed;

pub use env::EnvSecretProvider;
pub use fixed::StaticSecretProvider;
