use super::{
    ChargeParams, PaymentMethodInfo, ProcessorClient, ProcessorError, ProcessorReceipt, ProcessorResult,
    RefundParams,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    payment_methods: HashMap<String, Option<String>>,
    charges: HashMap<String, (ChargeParams, ProcessorReceipt)>,
    refunds: HashMap<String, (RefundParams, ProcessorReceipt)>,
    charge_calls: usize,
    refund_calls: usize,
    charge_status: String,
    refund_status: String,
    failure: Option<ProcessorError>,
}

/// Processor sandbox that honours idempotency keys and records calls.
#[derive(Clone)]
pub struct InMemoryProcessor {
    state: Arc<RwLock<State>>,
}

impl Default for InMemoryProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProcessor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                charge_status: "succeeded".to_string(),
                refund_status: "succeeded".to_string(),
                ..State::default()
            })),
        }
    }

    /// Registers a payment method, optionally attached to a customer.
    pub async fn add_payment_method(&self, id: &str, customer_id: Option<&str>) {
        self.state
            .write()
            .await
            .payment_methods
            .insert(id.to_string(), customer_id.map(str::to_string));
    }

    /// Raw status reported for new charges.
    pub async fn set_charge_status(&self, status: &str) {
        self.state.write().await.charge_status = status.to_string();
    }

    /// Raw status reported for new refunds.
    pub async fn set_refund_status(&self, status: &str) {
        self.state.write().await.refund_status = status.to_string();
    }

    /// Makes every subsequent call fail with `error` until cleared.
    pub async fn fail_with(&self, error: Option<ProcessorError>) {
        self.state.write().await.failure = error;
    }

    /// Calls received, including idempotent replays.
    pub async fn charge_calls(&self) -> usize {
        self.state.read().await.charge_calls
    }

    /// Distinct charges created.
    pub async fn charges_created(&self) -> usize {
        self.state.read().await.charges.len()
    }

    pub async fn refund_calls(&self) -> usize {
        self.state.read().await.refund_calls
    }

    pub async fn refunds_created(&self) -> usize {
        self.state.read().await.refunds.len()
    }

    pub async fn charge_for_key(&self, idempotency_key: &str) -> Option<ChargeParams> {
        self.state
            .read()
            .await
            .charges
            .get(idempotency_key)
            .map(|(params, _)| params.clone())
    }
}

#[async_trait]
impl ProcessorClient for InMemoryProcessor {
    async fn charge(&self, params: &ChargeParams) -> ProcessorResult<ProcessorReceipt> {
        let mut state = self.state.write().await;
        state.charge_calls += 1;
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }

        if let Some((original, receipt)) = state.charges.get(&params.idempotency_key) {
            if original != params {
                return Err(ProcessorError::Api {
                    status: 400,
                    message: "idempotency key reused with different parameters".to_string(),
                });
            }
            return Ok(receipt.clone());
        }

        let receipt = ProcessorReceipt {
            reference_id: format!("pi_{}", Uuid::new_v4().simple()),
            status: state.charge_status.clone(),
        };
        state
            .charges
            .insert(params.idempotency_key.clone(), (params.clone(), receipt.clone()));
        Ok(receipt)
    }

    async fn refund(&self, params: &RefundParams) -> ProcessorResult<ProcessorReceipt> {
        let mut state = self.state.write().await;
        state.refund_calls += 1;
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }

        if let Some((_, receipt)) = state.refunds.get(&params.idempotency_key) {
            return Ok(receipt.clone());
        }
        if !state
            .charges
            .values()
            .any(|(_, receipt)| receipt.reference_id == params.charge_reference_id)
        {
            return Err(ProcessorError::NotFound(params.charge_reference_id.clone()));
        }

        let receipt = ProcessorReceipt {
            reference_id: format!("re_{}", Uuid::new_v4().simple()),
            status: state.refund_status.clone(),
        };
        state
            .refunds
            .insert(params.idempotency_key.clone(), (params.clone(), receipt.clone()));
        Ok(receipt)
    }

    async fn payment_method(&self, id: &str) -> ProcessorResult<PaymentMethodInfo> {
        let state = self.state.read().await;
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        state
            .payment_methods
            .get(id)
            .map(|customer| PaymentMethodInfo {
                id: id.to_string(),
                customer_id: customer.clone(),
            })
            .ok_or_else(|| ProcessorError::NotFound(format!("payment method {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, RefundReason};

    fn params(key: &str, amount: i64) -> ChargeParams {
        ChargeParams {
            amount,
            currency: Currency::Eur,
            payment_method_id: "pm_1".to_string(),
            customer_id: Some("cus_1".to_string()),
            description: None,
            metadata: Default::default(),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_charge_is_idempotent_by_key() {
        let processor = InMemoryProcessor::new();
        let first = processor.charge(&params("k1", 500)).await.unwrap();
        let replay = processor.charge(&params("k1", 500)).await.unwrap();

        assert_eq!(first, replay);
        assert_eq!(processor.charge_calls().await, 2);
        assert_eq!(processor.charges_created().await, 1);

        let conflict = processor.charge(&params("k1", 900)).await;
        assert!(matches!(conflict, Err(ProcessorError::Api { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_refund_requires_known_charge() {
        let processor = InMemoryProcessor::new();
        let charge = processor.charge(&params("k1", 500)).await.unwrap();

        let refund = RefundParams {
            charge_reference_id: charge.reference_id.clone(),
            amount: 200,
            reason: RefundReason::Duplicate,
            idempotency_key: "r1".to_string(),
        };
        let receipt = processor.refund(&refund).await.unwrap();
        assert!(receipt.reference_id.starts_with("re_"));
        assert_eq!(processor.refund(&refund).await.unwrap(), receipt);
        assert_eq!(processor.refunds_created().await, 1);

        let unknown = RefundParams {
            charge_reference_id: "pi_unknown".to_string(),
            idempotency_key: "r2".to_string(),
            ..refund
        };
        assert!(matches!(processor.refund(&unknown).await, Err(ProcessorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_payment_method_lookup_and_failures() {
        let processor = InMemoryProcessor::new();
        processor.add_payment_method("pm_1", Some("cus_1")).await;

        let pm = processor.payment_method("pm_1").await.unwrap();
        assert_eq!(pm.customer_id.as_deref(), Some("cus_1"));
        assert!(matches!(
            processor.payment_method("pm_2").await,
            Err(ProcessorError::NotFound(_))
        ));

        processor
            .fail_with(Some(ProcessorError::Transport("connection reset".to_string())))
            .await;
        assert!(processor.charge(&params("k9", 100)).await.is_err());
        assert_eq!(processor.charges_created().await, 0);
    }
}
