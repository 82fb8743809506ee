//! Durable record of payments and refunds.
//!
//! Status changes are forward-only: `Pending` may move to a terminal status,
//! terminal statuses never change, and repeating a status is a no-op. A
//! status reported for a processor reference that has not been recorded yet
//! is parked and merged when the record is written, so the synchronous path
//! and webhooks converge regardless of arrival order.

pub mod in_memory;

pub use in_memory::InMemoryLedger;

use crate::models::{Dispute, Payment, PaymentStatus, Refund, RefundStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Idempotency key already used in this organization")]
    DuplicateIdempotencyKey,

    #[error("Processor reference already recorded: {0}")]
    DuplicateReference(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    #[error("Refund not found: {0}")]
    RefundNotFound(Uuid),

    #[error("Refund of {requested} exceeds remaining amount ({refunded} of {amount} refunded)")]
    RefundExceedsPayment { refunded: i64, requested: i64, amount: i64 },

    #[error("Payment is {0:?}, transition not allowed")]
    InvalidTransition(PaymentStatus),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result of applying an externally reported change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    /// The record changed.
    Applied(T),
    /// The record exists and already reflected the change (or a later one).
    Unchanged(T),
    /// No record carries this reference yet; the status was kept for later.
    Parked,
    /// No record carries this reference and the change cannot be kept.
    Unmatched,
}

impl<T> Transition<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// Outcome of claiming a webhook event id for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClaim {
    Claimed,
    AlreadyProcessed,
    InFlight,
}

/// Next payment status if `incoming` moves `current` forward.
pub fn payment_transition(current: PaymentStatus, incoming: PaymentStatus) -> Option<PaymentStatus> {
    match (current, incoming) {
        (PaymentStatus::Pending, PaymentStatus::Succeeded | PaymentStatus::Failed) => Some(incoming),
        _ => None,
    }
}

/// Next refund status if `incoming` moves `current` forward.
pub fn refund_transition(current: RefundStatus, incoming: RefundStatus) -> Option<RefundStatus> {
    if current == RefundStatus::Pending && incoming.is_terminal() {
        Some(incoming)
    } else {
        None
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Records a new payment, merging any status parked under its processor reference.
    ///
    /// Fails with [`LedgerError::DuplicateIdempotencyKey`] if the organization
    /// already has a payment under the same key.
    async fn insert_payment(&self, payment: Payment) -> LedgerResult<Payment>;

    async fn get_payment(&self, id: Uuid) -> LedgerResult<Option<Payment>>;

    async fn find_by_idempotency_key(&self, organization_id: Uuid, key: &str) -> LedgerResult<Option<Payment>>;

    async fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<Payment>>;

    /// Attaches the processor result to a payment released from review.
    async fn attach_processor_result(
        &self,
        payment_id: Uuid,
        reference: &str,
        status: PaymentStatus,
    ) -> LedgerResult<Payment>;

    /// Moves a payment held for review to `Failed`.
    async fn decline_review(&self, payment_id: Uuid) -> LedgerResult<Payment>;

    async fn apply_payment_status(&self, reference: &str, status: PaymentStatus) -> LedgerResult<Transition<Payment>>;

    async fn flag_dispute(&self, reference: &str, dispute: Dispute) -> LedgerResult<Transition<Payment>>;

    /// Sum of amounts of money-moving payments created at or after `since`.
    async fn organization_volume(&self, organization_id: Uuid, since: DateTime<Utc>) -> LedgerResult<i64>;

    /// Mean amount of money-moving payments created at or after `since`, if any.
    async fn organization_average_amount(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> LedgerResult<Option<f64>>;

    /// Number of payments the requester created at or after `since`, in any status.
    async fn requester_payment_count(&self, requester_id: Uuid, since: DateTime<Utc>) -> LedgerResult<usize>;

    /// Distinct request locations previously seen for the requester.
    async fn requester_locations(&self, requester_id: Uuid) -> LedgerResult<Vec<String>>;

    async fn customer_for_organization(&self, organization_id: Uuid) -> LedgerResult<Option<String>>;

    async fn set_customer(&self, organization_id: Uuid, customer_id: &str) -> LedgerResult<()>;

    /// Records a pending refund if the payment's effective refunds plus this one
    /// stay within the payment amount. The check and insert are atomic.
    async fn reserve_refund(&self, refund: Refund) -> LedgerResult<Refund>;

    async fn attach_refund_result(&self, refund_id: Uuid, reference: &str, status: RefundStatus) -> LedgerResult<Refund>;

    async fn mark_refund_failed(&self, refund_id: Uuid) -> LedgerResult<Refund>;

    async fn apply_refund_status(&self, reference: &str, status: RefundStatus) -> LedgerResult<Transition<Refund>>;

    async fn refunds_for_payment(&self, payment_id: Uuid) -> LedgerResult<Vec<Refund>>;

    /// Sum of effective refunds for the payment.
    async fn refunded_total(&self, payment_id: Uuid) -> LedgerResult<i64>;

    async fn claim_event(&self, event_id: &str) -> LedgerResult<EventClaim>;

    async fn complete_event(&self, event_id: &str) -> LedgerResult<()>;

    async fn release_event(&self, event_id: &str) -> LedgerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_transitions_are_forward_only() {
        use PaymentStatus::*;
        assert_eq!(payment_transition(Pending, Succeeded), Some(Succeeded));
        assert_eq!(payment_transition(Pending, Failed), Some(Failed));
        assert_eq!(payment_transition(Pending, Pending), None);
        assert_eq!(payment_transition(Succeeded, Succeeded), None);
        assert_eq!(payment_transition(Succeeded, Failed), None);
        assert_eq!(payment_transition(Failed, Succeeded), None);
        assert_eq!(payment_transition(Succeeded, Pending), None);
        assert_eq!(payment_transition(RequiresReview, Succeeded), None);
        assert_eq!(payment_transition(Pending, RequiresReview), None);
    }

    #[test]
    fn test_refund_transitions_are_forward_only() {
        use RefundStatus::*;
        assert_eq!(refund_transition(Pending, Succeeded), Some(Succeeded));
        assert_eq!(refund_transition(Pending, Canceled), Some(Canceled));
        assert_eq!(refund_transition(Pending, Pending), None);
        assert_eq!(refund_transition(Succeeded, Failed), None);
        assert_eq!(refund_transition(Failed, Succeeded), None);
    }
}
