//! Configuration for the payments core.
//!
//! Every section deserializes with defaults, so an empty source yields a
//! working configuration.

use crate::models::Role;
use secrets_service::SecretsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    pub limits: LimitConfig,
    pub fraud: FraudConfig,
    pub refunds: RefundPolicy,
    pub webhook: WebhookConfig,
    pub processor: ProcessorConfig,
    pub audit: AuditConfig,
    pub secrets: SecretsConfig,
}

/// Organization spend-rate policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Cap in minor units over the rolling window
    pub default_cap: i64,
    pub window_days: i64,
    /// Per-organization caps replacing `default_cap`
    pub overrides: HashMap<Uuid, i64>,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            default_cap: 10_000_000,
            window_days: 30,
            overrides: HashMap::new(),
        }
    }
}

impl LimitConfig {
    pub fn cap_for(&self, organization_id: Uuid) -> i64 {
        self.overrides
            .get(&organization_id)
            .copied()
            .unwrap_or(self.default_cap)
    }
}

/// Weights and thresholds of the fraud heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    pub velocity_window_secs: i64,
    /// Signal fires when the requester's count in the window exceeds this
    pub velocity_threshold: usize,
    pub velocity_weight: f64,
    pub amount_window_days: i64,
    pub amount_multiplier: f64,
    pub amount_weight: f64,
    pub geo_weight: f64,
    /// Scores strictly above this are held for review
    pub review_threshold: f64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            velocity_window_secs: 3600,
            velocity_threshold: 5,
            velocity_weight: 0.3,
            amount_window_days: 30,
            amount_multiplier: 3.0,
            amount_weight: 0.2,
            geo_weight: 0.2,
            review_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundPolicy {
    pub window_days: i64,
    pub allowed_roles: Vec<Role>,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            window_days: 90,
            allowed_roles: vec![Role::Owner, Role::Admin],
        }
    }
}

impl RefundPolicy {
    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub secret_path: String,
    pub secret_key: String,
    pub tolerance_secs: i64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_path: "webhooks/processor".to_string(),
            secret_key: "signing_secret".to_string(),
            tolerance_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    Http,
    #[default]
    Sandbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub kind: ProcessorKind,
    pub base_url: String,
    pub api_key_path: String,
    pub api_key_key: String,
    pub timeout_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            kind: ProcessorKind::Sandbox,
            base_url: crate::processor::http::DEFAULT_BASE_URL.to_string(),
            api_key_path: "processor".to_string(),
            api_key_key: "api_key".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ProcessorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    #[default]
    Tracing,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    pub queue_capacity: usize,
    pub write_timeout_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::Tracing,
            queue_capacity: audit_engine::DEFAULT_QUEUE_CAPACITY,
            write_timeout_ms: 2_000,
        }
    }
}
