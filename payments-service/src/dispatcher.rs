//! Routes verified processor events to ledger updates.
//!
//! Each event id is claimed before handling, marked processed after success,
//! and released on failure so a redelivery retries it. Audit entries are only
//! written for changes that were actually applied.

use crate::audit::AuditAction;
use crate::error::{PaymentError, PaymentResult};
use crate::events::{EventKind, ProcessorEvent, RefundUpdate};
use crate::ledger::{EventClaim, Ledger, Transition};
use crate::models::{Dispute, PaymentStatus};
use crate::processor::refund_status;
use audit_engine::AuditLogger;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handled; `changed` tells whether any ledger record moved.
    Processed { changed: bool },
    /// Event id already processed; nothing done.
    Duplicate,
    /// Event type not acted on.
    Unhandled,
}

pub struct EventDispatcher {
    ledger: Arc<dyn Ledger>,
    audit: AuditLogger,
}

impl EventDispatcher {
    pub fn new(ledger: Arc<dyn Ledger>, audit: AuditLogger) -> Self {
        Self { ledger, audit }
    }

    /// Applies `event` at most once per event id.
    ///
    /// # Errors
    ///
    /// [`PaymentError::EventInFlight`] while another delivery of the same id is
    /// being handled; ledger failures otherwise. On error the event is left
    /// unprocessed so the processor's redelivery retries it.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn dispatch(&self, event: &ProcessorEvent) -> PaymentResult<DispatchOutcome> {
        match self.ledger.claim_event(&event.id).await? {
            EventClaim::Claimed => {}
            EventClaim::AlreadyProcessed => {
                info!("Duplicate webhook event ignored");
                return Ok(DispatchOutcome::Duplicate);
            }
            EventClaim::InFlight => {
                warn!("Webhook event already in flight");
                return Err(PaymentError::EventInFlight(event.id.clone()));
            }
        }

        match self.handle(event).await {
            Ok(outcome) => {
                if let Err(e) = self.ledger.complete_event(&event.id).await {
                    error!(error = %e, "Failed to mark webhook event processed");
                    self.release(&event.id).await;
                }
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Webhook event handling failed");
                self.release(&event.id).await;
                Err(e)
            }
        }
    }

    async fn release(&self, event_id: &str) {
        if let Err(e) = self.ledger.release_event(event_id).await {
            error!(event_id, error = %e, "Failed to release webhook event claim");
        }
    }

    async fn handle(&self, event: &ProcessorEvent) -> PaymentResult<DispatchOutcome> {
        match &event.kind {
            EventKind::PaymentSucceeded { payment_reference } => {
                self.payment_status(event, payment_reference, PaymentStatus::Succeeded)
                    .await
            }
            EventKind::PaymentFailed { payment_reference } => {
                self.payment_status(event, payment_reference, PaymentStatus::Failed)
                    .await
            }
            EventKind::ChargeRefunded {
                payment_reference,
                refunds,
            } => self.refunds(event, payment_reference, refunds).await,
            EventKind::DisputeCreated {
                payment_reference,
                dispute_id,
                reason,
            } => {
                self.dispute(event, payment_reference, dispute_id, reason.clone())
                    .await
            }
            EventKind::Unhandled { event_type } => {
                info!(event_type = %event_type, "Unhandled webhook event");
                Ok(DispatchOutcome::Unhandled)
            }
        }
    }

    async fn payment_status(
        &self,
        event: &ProcessorEvent,
        reference: &str,
        status: PaymentStatus,
    ) -> PaymentResult<DispatchOutcome> {
        let changed = match self.ledger.apply_payment_status(reference, status).await? {
            Transition::Applied(payment) => {
                info!(payment_id = %payment.id, reference_id = reference, status = ?status, "Payment status reconciled");
                self.audit.log(
                    AuditAction::PaymentStatusReconciled
                        .system()
                        .organization(payment.organization_id)
                        .resource("payment", payment.id)
                        .metadata(json!({
                            "status": payment.status,
                            "processor_reference_id": reference,
                            "event_id": event.id,
                        })),
                );
                true
            }
            Transition::Unchanged(payment) => {
                debug!(payment_id = %payment.id, current = ?payment.status, "Payment status already reconciled");
                false
            }
            Transition::Parked => {
                info!(reference_id = reference, status = ?status, "Status parked for unrecorded payment");
                false
            }
            Transition::Unmatched => {
                warn!(reference_id = reference, "Status for unknown payment ignored");
                false
            }
        };
        Ok(DispatchOutcome::Processed { changed })
    }

    async fn refunds(
        &self,
        event: &ProcessorEvent,
        payment_reference: &str,
        refunds: &[RefundUpdate],
    ) -> PaymentResult<DispatchOutcome> {
        let payment = self.ledger.find_by_reference(payment_reference).await?;
        let mut changed = false;

        for update in refunds {
            let Some(status) = refund_status(&update.status) else {
                error!(
                    reference_id = %update.reference_id,
                    raw_status = %update.status,
                    "Unrecognized processor refund status"
                );
                continue;
            };

            match self.ledger.apply_refund_status(&update.reference_id, status).await? {
                Transition::Applied(refund) => {
                    changed = true;
                    info!(refund_id = %refund.id, status = ?refund.status, "Refund status reconciled");
                    let mut entry = AuditAction::RefundStatusReconciled
                        .system()
                        .resource("refund", refund.id)
                        .metadata(json!({
                            "status": refund.status,
                            "payment_id": refund.payment_id,
                            "processor_reference_id": update.reference_id,
                            "event_id": event.id,
                        }));
                    if let Some(payment) = &payment {
                        entry = entry.organization(payment.organization_id);
                    }
                    self.audit.log(entry);
                }
                Transition::Unchanged(_) => {}
                Transition::Parked => {
                    info!(reference_id = %update.reference_id, status = ?status, "Status parked for unrecorded refund");
                }
                Transition::Unmatched => {
                    debug!(reference_id = %update.reference_id, "Pending status for unknown refund ignored");
                }
            }
        }

        Ok(DispatchOutcome::Processed { changed })
    }

    async fn dispute(
        &self,
        event: &ProcessorEvent,
        reference: &str,
        dispute_id: &str,
        reason: Option<String>,
    ) -> PaymentResult<DispatchOutcome> {
        let dispute = Dispute {
            id: dispute_id.to_string(),
            reason,
            flagged_at: Utc::now(),
        };

        let changed = match self.ledger.flag_dispute(reference, dispute).await? {
            Transition::Applied(payment) => {
                warn!(payment_id = %payment.id, dispute_id, "Payment disputed");
                self.audit.log(
                    AuditAction::PaymentDisputed
                        .system()
                        .organization(payment.organization_id)
                        .resource("payment", payment.id)
                        .metadata(json!({
                            "dispute_id": dispute_id,
                            "reason": payment.dispute.as_ref().and_then(|d| d.reason.clone()),
                            "event_id": event.id,
                        })),
                );
                true
            }
            Transition::Unchanged(_) => false,
            Transition::Parked | Transition::Unmatched => {
                warn!(reference_id = reference, dispute_id, "Dispute for unknown payment");
                false
            }
        };
        Ok(DispatchOutcome::Processed { changed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::models::{Currency, Payment};
    use audit_engine::InMemoryAuditSink;
    use uuid::Uuid;

    async fn setup() -> (EventDispatcher, InMemoryLedger, InMemoryAuditSink) {
        let ledger = InMemoryLedger::new();
        let sink = InMemoryAuditSink::new();
        let audit = AuditLogger::spawn(Arc::new(sink.clone()));
        let now = Utc::now();
        ledger
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                organization_id: Uuid::new_v4(),
                requester_id: Uuid::new_v4(),
                amount: 1000,
                currency: Currency::Usd,
                status: PaymentStatus::Pending,
                payment_method_id: "pm_1".to_string(),
                processor_reference_id: Some("pi_1".to_string()),
                idempotency_key: "k1".to_string(),
                fraud_score: 0.0,
                description: None,
                metadata: Default::default(),
                origin: None,
                dispute: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (
            EventDispatcher::new(Arc::new(ledger.clone()), audit),
            ledger,
            sink,
        )
    }

    fn event(id: &str, kind: EventKind) -> ProcessorEvent {
        ProcessorEvent {
            id: id.to_string(),
            event_type: "test".to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_same_event_twice_applies_once() {
        let (dispatcher, ledger, sink) = setup().await;
        let succeeded = event(
            "evt_1",
            EventKind::PaymentSucceeded {
                payment_reference: "pi_1".to_string(),
            },
        );

        assert_eq!(
            dispatcher.dispatch(&succeeded).await.unwrap(),
            DispatchOutcome::Processed { changed: true }
        );
        assert_eq!(dispatcher.dispatch(&succeeded).await.unwrap(), DispatchOutcome::Duplicate);

        dispatcher.audit.flush().await.unwrap();
        assert_eq!(sink.with_action("PAYMENT_STATUS_RECONCILED").await.len(), 1);
        let payment = ledger.find_by_reference("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_late_failure_after_success_is_noop() {
        let (dispatcher, ledger, sink) = setup().await;
        dispatcher
            .dispatch(&event(
                "evt_1",
                EventKind::PaymentSucceeded {
                    payment_reference: "pi_1".to_string(),
                },
            ))
            .await
            .unwrap();
        let outcome = dispatcher
            .dispatch(&event(
                "evt_2",
                EventKind::PaymentFailed {
                    payment_reference: "pi_1".to_string(),
                },
            ))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Processed { changed: false });
        dispatcher.audit.flush().await.unwrap();
        assert_eq!(sink.entries().await.len(), 1);
        let payment = ledger.find_by_reference("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_releases_claim_for_redelivery() {
        let (dispatcher, ledger, _sink) = setup().await;
        let succeeded = event(
            "evt_1",
            EventKind::PaymentSucceeded {
                payment_reference: "pi_1".to_string(),
            },
        );

        // claim_event itself fails while the ledger is down
        ledger.set_unavailable(true);
        assert!(dispatcher.dispatch(&succeeded).await.is_err());
        ledger.set_unavailable(false);

        assert_eq!(
            dispatcher.dispatch(&succeeded).await.unwrap(),
            DispatchOutcome::Processed { changed: true }
        );
    }

    #[tokio::test]
    async fn test_in_flight_event_is_rejected() {
        let (dispatcher, ledger, _sink) = setup().await;
        ledger.claim_event("evt_busy").await.unwrap();
        let result = dispatcher
            .dispatch(&event(
                "evt_busy",
                EventKind::PaymentSucceeded {
                    payment_reference: "pi_1".to_string(),
                },
            ))
            .await;
        assert!(matches!(result, Err(PaymentError::EventInFlight(_))));
    }

    #[tokio::test]
    async fn test_dispute_flags_without_status_change() {
        let (dispatcher, ledger, sink) = setup().await;
        let outcome = dispatcher
            .dispatch(&event(
                "evt_d",
                EventKind::DisputeCreated {
                    payment_reference: "pi_1".to_string(),
                    dispute_id: "dp_1".to_string(),
                    reason: Some("fraudulent".to_string()),
                },
            ))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Processed { changed: true });

        let payment = ledger.find_by_reference("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.dispute.is_some());

        dispatcher.audit.flush().await.unwrap();
        assert_eq!(sink.with_action("PAYMENT_DISPUTED").await.len(), 1);
    }

    #[tokio::test]
    async fn test_unhandled_and_unknown_refund_statuses() {
        let (dispatcher, _ledger, sink) = setup().await;
        assert_eq!(
            dispatcher
                .dispatch(&event(
                    "evt_u",
                    EventKind::Unhandled {
                        event_type: "customer.created".to_string()
                    }
                ))
                .await
                .unwrap(),
            DispatchOutcome::Unhandled
        );

        let outcome = dispatcher
            .dispatch(&event(
                "evt_r",
                EventKind::ChargeRefunded {
                    payment_reference: "pi_1".to_string(),
                    refunds: vec![RefundUpdate {
                        reference_id: "re_x".to_string(),
                        status: "mystery".to_string(),
                    }],
                },
            ))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Processed { changed: false });

        dispatcher.audit.flush().await.unwrap();
        assert!(sink.entries().await.is_empty());
    }
}
