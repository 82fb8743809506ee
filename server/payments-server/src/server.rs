//! Shared application state and its construction from configuration.

use crate::config::AppConfig;
use anyhow::Context;
use audit_engine::{AuditLogger, AuditSink, InMemoryAuditSink, TracingAuditSink};
use payments_service::config::{AuditSinkKind, ProcessorKind};
use payments_service::{
    HttpProcessorClient, InMemoryLedger, InMemoryProcessor, Ledger, PaymentService, ProcessorClient,
};
use secrets_service::SecretsManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Payments server state shared across handlers
#[derive(Clone)]
pub struct PaymentsServer {
    pub service: Arc<PaymentService>,
    pub processor_kind: ProcessorKind,
    pub secrets_provider: String,
    pub started_at: Instant,
}

impl PaymentsServer {
    pub fn new(service: Arc<PaymentService>, processor_kind: ProcessorKind, secrets_provider: impl Into<String>) -> Self {
        Self {
            service,
            processor_kind,
            secrets_provider: secrets_provider.into(),
            started_at: Instant::now(),
        }
    }

    /// Wires the ledger, processor client, secrets manager and audit logger
    /// described by `config`.
    ///
    /// # Errors
    ///
    /// Fails when the processor API key cannot be read or the HTTP client
    /// cannot be built.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        info!("Initializing payments server");

        let secrets = SecretsManager::from_config(&config.payments.secrets);

        let ledger = Arc::new(InMemoryLedger::new());
        for (organization_id, customer_id) in &config.customers {
            ledger
                .set_customer(*organization_id, customer_id)
                .await
                .with_context(|| format!("registering customer for organization {organization_id}"))?;
        }
        info!(organizations = config.customers.len(), "Ledger initialized");

        let processor_config = &config.payments.processor;
        let processor: Arc<dyn ProcessorClient> = match processor_config.kind {
            ProcessorKind::Sandbox => {
                let sandbox = InMemoryProcessor::new();
                for (method, customer) in &config.sandbox.payment_methods {
                    sandbox.add_payment_method(method, Some(customer.as_str())).await;
                }
                info!(payment_methods = config.sandbox.payment_methods.len(), "Using sandbox processor");
                Arc::new(sandbox)
            }
            ProcessorKind::Http => {
                let api_key = secrets
                    .get_secret(&processor_config.api_key_path, &processor_config.api_key_key)
                    .await
                    .context("reading processor API key")?;
                let client = HttpProcessorClient::new(&processor_config.base_url, api_key, processor_config.timeout())
                    .context("building processor HTTP client")?;
                info!(base_url = %processor_config.base_url, "Using HTTP processor");
                Arc::new(client)
            }
        };

        let audit_config = &config.payments.audit;
        let sink: Arc<dyn AuditSink> = match audit_config.sink {
            AuditSinkKind::Tracing => Arc::new(TracingAuditSink),
            AuditSinkKind::Memory => Arc::new(InMemoryAuditSink::new()),
        };
        let audit = AuditLogger::spawn_with(
            sink,
            audit_config.queue_capacity,
            Duration::from_millis(audit_config.write_timeout_ms),
        );

        let secrets_provider = secrets.provider_name().to_string();
        let ledger: Arc<dyn Ledger> = ledger;
        let service = PaymentService::new(ledger, processor, secrets, audit, &config.payments);

        Ok(Self::new(Arc::new(service), processor_config.kind, secrets_provider))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
