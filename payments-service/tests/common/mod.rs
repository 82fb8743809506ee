#![allow(dead_code)]

use audit_engine::{AuditLogger, InMemoryAuditSink};
use chrono::{Duration, Utc};
use payments_service::webhook::sign_payload;
use payments_service::{
    Actor, ChargeRequest, Currency, DispatchOutcome, InMemoryLedger, InMemoryProcessor, Ledger, Payment,
    PaymentResult, PaymentService, PaymentStatus, PaymentsConfig, ProcessorClient, Role,
};
use secrets_service::{SecretsManager, StaticConfig, StaticSecretProvider};
use std::sync::Arc;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const CUSTOMER: &str = "cus_acme";
pub const METHOD: &str = "pm_card_visa";

pub struct Harness {
    pub service: PaymentService,
    pub ledger: InMemoryLedger,
    pub processor: InMemoryProcessor,
    pub sink: InMemoryAuditSink,
    pub organization_id: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(PaymentsConfig::default()).await
    }

    pub async fn with_config(config: PaymentsConfig) -> Self {
        let processor = InMemoryProcessor::new();
        Self::build(config, Arc::new(processor.clone()), processor, true).await
    }

    /// Harness whose service talks to `client` instead of the sandbox processor.
    pub async fn with_client(config: PaymentsConfig, client: Arc<dyn ProcessorClient>) -> Self {
        Self::build(config, client, InMemoryProcessor::new(), true).await
    }

    pub async fn without_webhook_secret() -> Self {
        let processor = InMemoryProcessor::new();
        Self::build(PaymentsConfig::default(), Arc::new(processor.clone()), processor, false).await
    }

    async fn build(
        config: PaymentsConfig,
        client: Arc<dyn ProcessorClient>,
        processor: InMemoryProcessor,
        register_secret: bool,
    ) -> Self {
        let ledger = InMemoryLedger::new();
        let sink = InMemoryAuditSink::new();
        let audit = AuditLogger::spawn(Arc::new(sink.clone()));

        let mut provider = StaticSecretProvider::new(StaticConfig::default());
        if register_secret {
            provider = provider.with_secret(&config.webhook.secret_path, &config.webhook.secret_key, WEBHOOK_SECRET);
        }
        let secrets = SecretsManager::new(Arc::new(provider), std::time::Duration::from_secs(1));

        let organization_id = Uuid::new_v4();
        ledger.set_customer(organization_id, CUSTOMER).await.unwrap();
        processor.add_payment_method(METHOD, Some(CUSTOMER)).await;

        let service = PaymentService::new(Arc::new(ledger.clone()), client, secrets, audit, &config);

        Self {
            service,
            ledger,
            processor,
            sink,
            organization_id,
        }
    }

    pub fn actor(&self, role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            organization_id: self.organization_id,
            role,
            location: None,
        }
    }

    /// Audit actions recorded so far, in write order.
    pub async fn audit_actions(&self) -> Vec<String> {
        self.service.audit().flush().await.unwrap();
        self.sink.entries().await.into_iter().map(|e| e.action).collect()
    }

    pub async fn audit_count(&self, action: &str) -> usize {
        self.service.audit().flush().await.unwrap();
        self.sink.with_action(action).await.len()
    }

    pub async fn deliver(&self, body: &str) -> PaymentResult<DispatchOutcome> {
        let header = sign(body);
        self.service.handle_webhook(body.as_bytes(), Some(&header)).await
    }

    /// Inserts a historical payment directly into the ledger.
    pub async fn seed_payment(
        &self,
        requester_id: Uuid,
        amount: i64,
        status: PaymentStatus,
        age: Duration,
        origin: Option<&str>,
    ) -> Payment {
        let created_at = Utc::now() - age;
        self.ledger
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                organization_id: self.organization_id,
                requester_id,
                amount,
                currency: Currency::Usd,
                status,
                payment_method_id: METHOD.to_string(),
                processor_reference_id: Some(format!("pi_seed_{}", Uuid::new_v4().simple())),
                idempotency_key: Uuid::new_v4().to_string(),
                fraud_score: 0.0,
                description: None,
                metadata: Default::default(),
                origin: origin.map(str::to_string),
                dispute: None,
                created_at,
                updated_at: created_at,
            })
            .await
            .unwrap()
    }
}

pub fn charge(amount: i64, key: &str) -> ChargeRequest {
    ChargeRequest {
        amount,
        currency: "usd".to_string(),
        payment_method_id: METHOD.to_string(),
        description: None,
        metadata: Default::default(),
        idempotency_key: key.to_string(),
    }
}

pub fn sign(body: &str) -> String {
    sign_payload(body.as_bytes(), WEBHOOK_SECRET.as_bytes(), Utc::now().timestamp()).unwrap()
}

pub fn payment_intent_event(event_id: &str, event_type: &str, reference: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": { "id": reference, "object": "payment_intent" } }
    })
    .to_string()
}
