use crate::server::PaymentsServer;
use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::HashMap;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
    pub version: String,
    /// Uptime in seconds
    pub uptime: u64,
    pub checks: HashMap<String, String>,
}

/// Liveness check
pub async fn health_check(State(server): State<PaymentsServer>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    checks.insert(
        "processor".to_string(),
        serde_json::to_value(server.processor_kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
    );
    checks.insert("secrets".to_string(), server.secrets_provider.clone());

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.uptime().as_secs(),
        checks,
    })
}
