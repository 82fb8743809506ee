//! Destinations for audit entries.

use crate::entry::AuditEntry;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence mechanism for audit entries.
///
/// Implementations may be slow or fail; [`crate::AuditLogger`] isolates callers from both.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, entry: &AuditEntry) -> Result<()>;
}

/// Writes each entry as a structured `tracing` event on the `audit` target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn write(&self, entry: &AuditEntry) -> Result<()> {
        tracing::info!(
            target: "audit",
            audit_id = %entry.id,
            action = %entry.action,
            actor_id = ?entry.actor_id,
            organization_id = ?entry.organization_id,
            resource_type = ?entry.resource_type,
            resource_id = ?entry.resource_id,
            metadata = %entry.metadata,
            "audit entry"
        );
        Ok(())
    }
}

/// Keeps entries in memory. Used by tests and local sandboxes.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    /// Entries recorded with the given action name.
    pub async fn with_action(&self, action: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_filters_by_action() {
        let sink = InMemoryAuditSink::new();
        sink.write(&AuditEntry::new("A")).await.unwrap();
        sink.write(&AuditEntry::new("B")).await.unwrap();
        sink.write(&AuditEntry::new("A")).await.unwrap();

        assert_eq!(sink.entries().await.len(), 3);
        assert_eq!(sink.with_action("A").await.len(), 2);
        assert!(sink.with_action("C").await.is_empty());
    }
}
