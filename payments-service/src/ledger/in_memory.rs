use super::{
    payment_transition, refund_transition, EventClaim, Ledger, LedgerError, LedgerResult, Transition,
};
use crate::models::{Dispute, Payment, PaymentStatus, Refund, RefundStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// How long a terminal status for an unknown reference waits for its record.
pub const PARKED_STATUS_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventState {
    InFlight,
    Processed,
}

#[derive(Default)]
struct State {
    payments: HashMap<Uuid, Payment>,
    idempotency_keys: HashMap<(Uuid, String), Uuid>,
    payment_refs: HashMap<String, Uuid>,
    refunds: HashMap<Uuid, Refund>,
    refund_refs: HashMap<String, Uuid>,
    parked_payment_statuses: HashMap<String, (PaymentStatus, DateTime<Utc>)>,
    parked_refund_statuses: HashMap<String, (RefundStatus, DateTime<Utc>)>,
    customers: HashMap<Uuid, String>,
    events: HashMap<String, EventState>,
}

impl State {
    fn payment_mut(&mut self, id: Uuid) -> LedgerResult<&mut Payment> {
        self.payments.get_mut(&id).ok_or(LedgerError::PaymentNotFound(id))
    }

    fn refund_mut(&mut self, id: Uuid) -> LedgerResult<&mut Refund> {
        self.refunds.get_mut(&id).ok_or(LedgerError::RefundNotFound(id))
    }

    fn effective_refunds(&self, payment_id: Uuid) -> i64 {
        self.refunds
            .values()
            .filter(|r| r.payment_id == payment_id && r.status.is_effective())
            .fold(0_i64, |acc, r| acc.saturating_add(r.amount))
    }

    fn claim_payment_reference(&mut self, reference: &str, payment_id: Uuid) -> LedgerResult<()> {
        match self.payment_refs.get(reference) {
            Some(existing) if *existing != payment_id => Err(LedgerError::DuplicateReference(reference.to_string())),
            _ => {
                self.payment_refs.insert(reference.to_string(), payment_id);
                Ok(())
            }
        }
    }

    fn merge_parked_payment_status(&mut self, reference: &str, status: PaymentStatus) -> PaymentStatus {
        self.parked_payment_statuses
            .remove(reference)
            .and_then(|(parked, _)| payment_transition(status, parked))
            .unwrap_or(status)
    }

    fn merge_parked_refund_status(&mut self, reference: &str, status: RefundStatus) -> RefundStatus {
        self.parked_refund_statuses
            .remove(reference)
            .and_then(|(parked, _)| refund_transition(status, parked))
            .unwrap_or(status)
    }

    /// Drops parked statuses whose record never arrived within `ttl`.
    fn prune_parked(&mut self, now: DateTime<Utc>, ttl: Duration) {
        let cutoff = now - ttl;

        self.parked_payment_statuses.retain(|reference, (status, parked_at)| {
            let keep = *parked_at > cutoff;
            if !keep {
                warn!(
                    target: "payments::reconciliation",
                    reference_id = %reference,
                    status = ?status,
                    parked_at = %parked_at,
                    "Dropping parked payment status with no matching payment"
                );
            }
            keep
        });
        self.parked_refund_statuses.retain(|reference, (status, parked_at)| {
            let keep = *parked_at > cutoff;
            if !keep {
                warn!(
                    target: "payments::reconciliation",
                    reference_id = %reference,
                    status = ?status,
                    parked_at = %parked_at,
                    "Dropping parked refund status with no matching refund"
                );
            }
            keep
        });
    }
}

/// Ledger kept in process memory.
///
/// Every operation runs inside a single write (or read) section of one
/// `RwLock`, which serializes conflicting updates. Terminal statuses for
/// references the ledger has not seen yet are parked for at most
/// `parked_ttl`.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<State>>,
    unavailable: Arc<AtomicBool>,
    parked_ttl: Duration,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            unavailable: Arc::default(),
            parked_ttl: Duration::days(PARKED_STATUS_TTL_DAYS),
        }
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parked_ttl(mut self, ttl: Duration) -> Self {
        self.parked_ttl = ttl;
        self
    }

    /// Simulates a storage outage: while set, every write fails with
    /// [`LedgerError::Unavailable`]. Reads keep working.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_writable(&self) -> LedgerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("storage offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn insert_payment(&self, mut payment: Payment) -> LedgerResult<Payment> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        let key = (payment.organization_id, payment.idempotency_key.clone());
        if state.idempotency_keys.contains_key(&key) {
            return Err(LedgerError::DuplicateIdempotencyKey);
        }
        if let Some(reference) = payment.processor_reference_id.clone() {
            state.claim_payment_reference(&reference, payment.id)?;
            payment.status = state.merge_parked_payment_status(&reference, payment.status);
        }

        state.idempotency_keys.insert(key, payment.id);
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> LedgerResult<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, organization_id: Uuid, key: &str) -> LedgerResult<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .idempotency_keys
            .get(&(organization_id, key.to_string()))
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payment_refs
            .get(reference)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn attach_processor_result(
        &self,
        payment_id: Uuid,
        reference: &str,
        status: PaymentStatus,
    ) -> LedgerResult<Payment> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        let current = state.payment_mut(payment_id)?.clone();
        if current.processor_reference_id.as_deref() == Some(reference) {
            return Ok(current);
        }
        if current.status != PaymentStatus::RequiresReview {
            return Err(LedgerError::InvalidTransition(current.status));
        }

        state.claim_payment_reference(reference, payment_id)?;
        let status = state.merge_parked_payment_status(reference, status);
        let payment = state.payment_mut(payment_id)?;
        payment.processor_reference_id = Some(reference.to_string());
        payment.status = status;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn decline_review(&self, payment_id: Uuid) -> LedgerResult<Payment> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let payment = state.payment_mut(payment_id)?;
        if payment.status != PaymentStatus::RequiresReview {
            return Err(LedgerError::InvalidTransition(payment.status));
        }
        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn apply_payment_status(&self, reference: &str, status: PaymentStatus) -> LedgerResult<Transition<Payment>> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        let Some(id) = state.payment_refs.get(reference).copied() else {
            if !status.is_terminal() {
                return Ok(Transition::Unmatched);
            }
            let now = Utc::now();
            state.prune_parked(now, self.parked_ttl);
            state
                .parked_payment_statuses
                .entry(reference.to_string())
                .or_insert((status, now));
            return Ok(Transition::Parked);
        };

        let payment = state.payment_mut(id)?;
        match payment_transition(payment.status, status) {
            Some(next) => {
                payment.status = next;
                payment.updated_at = Utc::now();
                Ok(Transition::Applied(payment.clone()))
            }
            None => Ok(Transition::Unchanged(payment.clone())),
        }
    }

    async fn flag_dispute(&self, reference: &str, dispute: Dispute) -> LedgerResult<Transition<Payment>> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        let Some(id) = state.payment_refs.get(reference).copied() else {
            return Ok(Transition::Unmatched);
        };
        let payment = state.payment_mut(id)?;
        if payment.dispute.as_ref().is_some_and(|d| d.id == dispute.id) {
            return Ok(Transition::Unchanged(payment.clone()));
        }
        payment.dispute = Some(dispute);
        payment.updated_at = Utc::now();
        Ok(Transition::Applied(payment.clone()))
    }

    async fn organization_volume(&self, organization_id: Uuid, since: DateTime<Utc>) -> LedgerResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.organization_id == organization_id && p.created_at >= since && p.status.counts_towards_volume())
            .fold(0_i64, |acc, p| acc.saturating_add(p.amount)))
    }

    #[allow(clippy::cast_precision_loss)]
    async fn organization_average_amount(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> LedgerResult<Option<f64>> {
        let state = self.state.read().await;
        let amounts: Vec<i64> = state
            .payments
            .values()
            .filter(|p| p.organization_id == organization_id && p.created_at >= since && p.status.counts_towards_volume())
            .map(|p| p.amount)
            .collect();
        if amounts.is_empty() {
            return Ok(None);
        }
        let total: f64 = amounts.iter().map(|a| *a as f64).sum();
        Ok(Some(total / amounts.len() as f64))
    }

    async fn requester_payment_count(&self, requester_id: Uuid, since: DateTime<Utc>) -> LedgerResult<usize> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.requester_id == requester_id && p.created_at >= since)
            .count())
    }

    async fn requester_locations(&self, requester_id: Uuid) -> LedgerResult<Vec<String>> {
        let state = self.state.read().await;
        let locations: BTreeSet<String> = state
            .payments
            .values()
            .filter(|p| p.requester_id == requester_id)
            .filter_map(|p| p.origin.clone())
            .collect();
        Ok(locations.into_iter().collect())
    }

    async fn customer_for_organization(&self, organization_id: Uuid) -> LedgerResult<Option<String>> {
        Ok(self.state.read().await.customers.get(&organization_id).cloned())
    }

    async fn set_customer(&self, organization_id: Uuid, customer_id: &str) -> LedgerResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .customers
            .insert(organization_id, customer_id.to_string());
        Ok(())
    }

    async fn reserve_refund(&self, refund: Refund) -> LedgerResult<Refund> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        let amount = state
            .payments
            .get(&refund.payment_id)
            .map(|p| p.amount)
            .ok_or(LedgerError::PaymentNotFound(refund.payment_id))?;
        let refunded = state.effective_refunds(refund.payment_id);
        if refunded.saturating_add(refund.amount) > amount {
            return Err(LedgerError::RefundExceedsPayment {
                refunded,
                requested: refund.amount,
                amount,
            });
        }

        state.refunds.insert(refund.id, refund.clone());
        Ok(refund)
    }

    async fn attach_refund_result(&self, refund_id: Uuid, reference: &str, status: RefundStatus) -> LedgerResult<Refund> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        state.refund_mut(refund_id)?;
        match state.refund_refs.get(reference) {
            Some(existing) if *existing != refund_id => {
                return Err(LedgerError::DuplicateReference(reference.to_string()));
            }
            _ => {
                state.refund_refs.insert(reference.to_string(), refund_id);
            }
        }

        let status = state.merge_parked_refund_status(reference, status);
        let refund = state.refund_mut(refund_id)?;
        refund.processor_reference_id = Some(reference.to_string());
        if let Some(next) = refund_transition(refund.status, status) {
            refund.status = next;
        }
        refund.updated_at = Utc::now();
        Ok(refund.clone())
    }

    async fn mark_refund_failed(&self, refund_id: Uuid) -> LedgerResult<Refund> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let refund = state.refund_mut(refund_id)?;
        if let Some(next) = refund_transition(refund.status, RefundStatus::Failed) {
            refund.status = next;
            refund.updated_at = Utc::now();
        }
        Ok(refund.clone())
    }

    async fn apply_refund_status(&self, reference: &str, status: RefundStatus) -> LedgerResult<Transition<Refund>> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        let Some(id) = state.refund_refs.get(reference).copied() else {
            if !status.is_terminal() {
                return Ok(Transition::Unmatched);
            }
            let now = Utc::now();
            state.prune_parked(now, self.parked_ttl);
            state
                .parked_refund_statuses
                .entry(reference.to_string())
                .or_insert((status, now));
            return Ok(Transition::Parked);
        };

        let refund = state.refund_mut(id)?;
        match refund_transition(refund.status, status) {
            Some(next) => {
                refund.status = next;
                refund.updated_at = Utc::now();
                Ok(Transition::Applied(refund.clone()))
            }
            None => Ok(Transition::Unchanged(refund.clone())),
        }
    }

    async fn refunds_for_payment(&self, payment_id: Uuid) -> LedgerResult<Vec<Refund>> {
        let state = self.state.read().await;
        let mut refunds: Vec<Refund> = state
            .refunds
            .values()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect();
        refunds.sort_by_key(|r| r.created_at);
        Ok(refunds)
    }

    async fn refunded_total(&self, payment_id: Uuid) -> LedgerResult<i64> {
        Ok(self.state.read().await.effective_refunds(payment_id))
    }

    async fn claim_event(&self, event_id: &str) -> LedgerResult<EventClaim> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        match state.events.get(event_id) {
            Some(EventState::Processed) => Ok(EventClaim::AlreadyProcessed),
            Some(EventState::InFlight) => Ok(EventClaim::InFlight),
            None => {
                state.events.insert(event_id.to_string(), EventState::InFlight);
                Ok(EventClaim::Claimed)
            }
        }
    }

    async fn complete_event(&self, event_id: &str) -> LedgerResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .events
            .insert(event_id.to_string(), EventState::Processed);
        Ok(())
    }

    async fn release_event(&self, event_id: &str) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        if state.events.get(event_id) == Some(&EventState::InFlight) {
            state.events.remove(event_id);
        }
        Ok(())
    }
}
