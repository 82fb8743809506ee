// Audit entry types and structures
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single security or compliance relevant action.
///
/// `actor_id` is `None` for actions taken by the system itself, such as
/// reconciliation driven by processor webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: action.into(),
            actor_id: None,
            organization_id: None,
            resource_type: None,
            resource_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
