use crate::config::LimitConfig;
use crate::error::{PaymentError, PaymentResult};
use crate::ledger::Ledger;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Enforces the organization's spend cap over a rolling window.
pub struct LimitEnforcer {
    ledger: Arc<dyn Ledger>,
    config: LimitConfig,
}

impl LimitEnforcer {
    pub fn new(ledger: Arc<dyn Ledger>, config: LimitConfig) -> Self {
        Self { ledger, config }
    }

    /// Fails with [`PaymentError::LimitExceeded`] if `amount` would push the
    /// organization's volume over its cap.
    ///
    /// # Errors
    ///
    /// Also propagates ledger read failures.
    pub async fn check(&self, organization_id: Uuid, amount: i64, now: DateTime<Utc>) -> PaymentResult<()> {
        let since = now - Duration::days(self.config.window_days);
        let current = self.ledger.organization_volume(organization_id, since).await?;
        let cap = self.config.cap_for(organization_id);

        if current.saturating_add(amount) > cap {
            warn!(
                organization_id = %organization_id,
                current,
                requested = amount,
                cap,
                "Payment limit exceeded"
            );
            return Err(PaymentError::LimitExceeded {
                current,
                requested: amount,
                cap,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::models::{Currency, Payment, PaymentStatus};

    async fn seed(ledger: &InMemoryLedger, org: Uuid, amount: i64, status: PaymentStatus, age_days: i64) {
        let created = Utc::now() - Duration::days(age_days);
        ledger
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                organization_id: org,
                requester_id: Uuid::new_v4(),
                amount,
                currency: Currency::Usd,
                status,
                payment_method_id: "pm_1".to_string(),
                processor_reference_id: Some(format!("pi_{}", Uuid::new_v4().simple())),
                idempotency_key: Uuid::new_v4().to_string(),
                fraud_score: 0.0,
                description: None,
                metadata: Default::default(),
                origin: None,
                dispute: None,
                created_at: created,
                updated_at: created,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cap_reached() {
        let ledger = InMemoryLedger::new();
        let org = Uuid::new_v4();
        seed(&ledger, org, 10_000, PaymentStatus::Succeeded, 1).await;

        let enforcer = LimitEnforcer::new(
            Arc::new(ledger),
            LimitConfig {
                default_cap: 10_000,
                ..LimitConfig::default()
            },
        );

        let result = enforcer.check(org, 1, Utc::now()).await;
        assert!(matches!(
            result,
            Err(PaymentError::LimitExceeded {
                current: 10_000,
                requested: 1,
                cap: 10_000
            })
        ));
    }

    #[tokio::test]
    async fn test_exactly_at_cap_is_allowed() {
        let ledger = InMemoryLedger::new();
        let org = Uuid::new_v4();
        seed(&ledger, org, 6_000, PaymentStatus::Pending, 2).await;

        let enforcer = LimitEnforcer::new(
            Arc::new(ledger),
            LimitConfig {
                default_cap: 10_000,
                ..LimitConfig::default()
            },
        );
        enforcer.check(org, 4_000, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_old_and_failed_payments_do_not_count() {
        let ledger = InMemoryLedger::new();
        let org = Uuid::new_v4();
        seed(&ledger, org, 9_000, PaymentStatus::Succeeded, 31).await;
        seed(&ledger, org, 9_000, PaymentStatus::Failed, 1).await;
        seed(&ledger, org, 9_000, PaymentStatus::RequiresReview, 1).await;

        let enforcer = LimitEnforcer::new(
            Arc::new(ledger),
            LimitConfig {
                default_cap: 10_000,
                ..LimitConfig::default()
            },
        );
        enforcer.check(org, 10_000, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_override_replaces_default() {
        let ledger = InMemoryLedger::new();
        let org = Uuid::new_v4();
        let mut config = LimitConfig {
            default_cap: 1_000_000,
            ..LimitConfig::default()
        };
        config.overrides.insert(org, 500);

        let enforcer = LimitEnforcer::new(Arc::new(ledger), config);
        assert!(enforcer.check(org, 501, Utc::now()).await.is_err());
        enforcer.check(Uuid::new_v4(), 501, Utc::now()).await.unwrap();
    }
}
