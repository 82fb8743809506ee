//! Payment orchestration: charge, refund, review release and webhook intake.

use crate::audit::AuditAction;
use crate::config::{PaymentsConfig, RefundPolicy, WebhookConfig};
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::{PaymentError, PaymentResult};
use crate::events::ProcessorEvent;
use crate::fraud::{FraudAssessment, FraudScorer};
use crate::ledger::{Ledger, LedgerError};
use crate::limits::LimitEnforcer;
use crate::models::{
    Actor, ChargeRequest, Payment, PaymentStatus, Refund, RefundRequest, RefundStatus, ReviewDecision,
    ReviewRequest, Role, ValidatedCharge,
};
use crate::processor::{
    charge_status, refund_status, ChargeParams, ProcessorClient, ProcessorError, ProcessorReceipt,
    ProcessorResult, RefundParams,
};
use crate::validation::{validate_charge, validate_refund, validate_review, ValidationErrors};
use crate::webhook::WebhookVerifier;
use audit_engine::AuditLogger;
use chrono::{DateTime, Duration, Utc};
use crypto::signing::sha256_hex;
use secrecy::ExposeSecret;
use secrets_service::SecretsManager;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub struct PaymentService {
    ledger: Arc<dyn Ledger>,
    processor: Arc<dyn ProcessorClient>,
    secrets: SecretsManager,
    audit: AuditLogger,
    limits: LimitEnforcer,
    fraud: FraudScorer,
    verifier: WebhookVerifier,
    dispatcher: EventDispatcher,
    refund_policy: RefundPolicy,
    webhook: WebhookConfig,
    processor_timeout: std::time::Duration,
}

impl PaymentService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        processor: Arc<dyn ProcessorClient>,
        secrets: SecretsManager,
        audit: AuditLogger,
        config: &PaymentsConfig,
    ) -> Self {
        Self {
            limits: LimitEnforcer::new(ledger.clone(), config.limits.clone()),
            fraud: FraudScorer::new(ledger.clone(), config.fraud.clone()),
            verifier: WebhookVerifier::new(config.webhook.tolerance_secs),
            dispatcher: EventDispatcher::new(ledger.clone(), audit.clone()),
            refund_policy: config.refunds.clone(),
            webhook: config.webhook.clone(),
            processor_timeout: config.processor.timeout(),
            ledger,
            processor,
            secrets,
            audit,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Authorizes and submits a charge.
    ///
    /// Replaying an idempotency key already used in the organization returns
    /// the recorded payment without contacting the processor.
    ///
    /// # Errors
    ///
    /// Validation, limit, ownership and fraud-hold rejections happen before any
    /// processor call. [`PaymentError::ChargeFailed`] when the processor call
    /// fails, [`PaymentError::Unreconciled`] when it succeeded but the payment
    /// could not be recorded.
    #[instrument(
        skip(self, actor, request),
        fields(organization_id = %actor.organization_id, requester_id = %actor.user_id)
    )]
    pub async fn create_payment(&self, actor: &Actor, request: &ChargeRequest) -> PaymentResult<Payment> {
        let charge = validate_charge(request)?;

        if let Some(existing) = self
            .ledger
            .find_by_idempotency_key(actor.organization_id, &charge.idempotency_key)
            .await?
        {
            return replay(existing, &charge);
        }

        let now = Utc::now();
        self.limits.check(actor.organization_id, charge.amount, now).await?;
        let customer_id = self
            .verify_payment_method(actor.organization_id, &charge.payment_method_id)
            .await?;
        let assessment = self.fraud.assess(actor, charge.amount, now).await?;

        let mut payment = new_payment(actor, charge.clone(), assessment.score, now);

        if assessment.requires_review(self.fraud.review_threshold()) {
            return self.hold_for_review(actor, payment, &charge, &assessment).await;
        }

        let params = charge_params(&payment, Some(customer_id));
        let receipt = self
            .call_processor(self.processor.charge(&params))
            .await
            .map_err(|e| {
                error!(payment_id = %payment.id, error = %e, "Processor charge failed");
                PaymentError::ChargeFailed(e)
            })?;

        payment.status = map_charge_status(&receipt);
        payment.processor_reference_id = Some(receipt.reference_id.clone());

        let stored = match self.ledger.insert_payment(payment.clone()).await {
            Ok(stored) => stored,
            Err(LedgerError::DuplicateIdempotencyKey) => {
                // a concurrent request with the same key got there first
                match self
                    .ledger
                    .find_by_idempotency_key(actor.organization_id, &charge.idempotency_key)
                    .await
                {
                    Ok(Some(existing)) => return replay(existing, &charge),
                    Ok(None) => {
                        return Err(self.unreconciled_payment(
                            actor,
                            &payment,
                            &receipt.reference_id,
                            LedgerError::DuplicateIdempotencyKey,
                        ))
                    }
                    Err(e) => return Err(self.unreconciled_payment(actor, &payment, &receipt.reference_id, e)),
                }
            }
            Err(e) => return Err(self.unreconciled_payment(actor, &payment, &receipt.reference_id, e)),
        };

        info!(
            payment_id = %stored.id,
            reference_id = %receipt.reference_id,
            status = ?stored.status,
            amount = stored.amount,
            "Payment created"
        );
        self.audit.log(
            AuditAction::PaymentCreated
                .by(actor)
                .resource("payment", stored.id)
                .metadata(json!({
                    "amount": stored.amount,
                    "currency": stored.currency,
                    "status": stored.status,
                    "fraud_score": stored.fraud_score,
                    "processor_reference_id": receipt.reference_id,
                })),
        );
        Ok(stored)
    }

    /// Refunds part or all of a payment.
    ///
    /// Checks run in order, each a hard stop: the payment exists in the
    /// actor's organization, the refund fits the remaining amount, the payment
    /// is inside the refund window, and the actor's role may refund.
    ///
    /// # Errors
    ///
    /// The corresponding rejection for each check, [`PaymentError::RefundFailed`]
    /// when the processor rejects the refund, [`PaymentError::RefundInDoubt`]
    /// when it may have refunded without answering, [`PaymentError::Unreconciled`]
    /// when the processor refunded but the result could not be recorded.
    #[instrument(
        skip(self, actor, request),
        fields(organization_id = %actor.organization_id, requester_id = %actor.user_id, payment_id = %payment_id)
    )]
    pub async fn create_refund(&self, actor: &Actor, payment_id: Uuid, request: &RefundRequest) -> PaymentResult<Refund> {
        let refund_request = validate_refund(request)?;
        let payment = self.payment_in_organization(actor, payment_id).await?;

        let refunded = self.ledger.refunded_total(payment.id).await?;
        if refunded.saturating_add(refund_request.amount) > payment.amount {
            warn!(refunded, requested = refund_request.amount, amount = payment.amount, "Refund exceeds payment");
            return Err(PaymentError::RefundExceedsPayment {
                refunded,
                requested: refund_request.amount,
                amount: payment.amount,
            });
        }

        let now = Utc::now();
        if now - payment.created_at > Duration::days(self.refund_policy.window_days) {
            warn!(created_at = %payment.created_at, "Refund window expired");
            return Err(PaymentError::RefundWindowExpired);
        }

        if !self.refund_policy.permits(actor.role) {
            warn!(role = actor.role.as_str(), "Role may not refund");
            return Err(PaymentError::InsufficientPermissions);
        }

        let charge_reference = match (&payment.processor_reference_id, payment.status) {
            (Some(reference), status) if status != PaymentStatus::Failed => reference.clone(),
            _ => {
                return Err(ValidationErrors::single("payment", "has no captured charge to refund").into());
            }
        };

        let reservation = Refund {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            amount: refund_request.amount,
            reason: refund_request.reason,
            status: RefundStatus::Pending,
            processor_reference_id: None,
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };
        let reserved = match self.ledger.reserve_refund(reservation).await {
            Ok(reserved) => reserved,
            Err(LedgerError::RefundExceedsPayment {
                refunded,
                requested,
                amount,
            }) => {
                warn!(refunded, requested, amount, "Concurrent refund exhausted the payment");
                return Err(PaymentError::RefundExceedsPayment {
                    refunded,
                    requested,
                    amount,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let params = RefundParams {
            charge_reference_id: charge_reference,
            amount: reserved.amount,
            reason: reserved.reason,
            idempotency_key: reserved.id.to_string(),
        };
        let receipt = match self.call_processor(self.processor.refund(&params)).await {
            Ok(receipt) => receipt,
            Err(e) if e.outcome_unknown() => return Err(self.refund_in_doubt(actor, &reserved, e)),
            Err(e) => {
                error!(refund_id = %reserved.id, error = %e, "Processor refund failed");
                if let Err(ledger_err) = self.ledger.mark_refund_failed(reserved.id).await {
                    error!(refund_id = %reserved.id, error = %ledger_err, "Failed to release refund reservation");
                }
                return Err(PaymentError::RefundFailed(e));
            }
        };

        let status = refund_status(&receipt.status).unwrap_or_else(|| {
            error!(
                reference_id = %receipt.reference_id,
                raw_status = %receipt.status,
                "Unrecognized processor refund status; recording as pending"
            );
            RefundStatus::Pending
        });

        let stored = self
            .ledger
            .attach_refund_result(reserved.id, &receipt.reference_id, status)
            .await
            .map_err(|e| self.unreconciled_refund(actor, &reserved, &receipt.reference_id, e))?;

        info!(refund_id = %stored.id, status = ?stored.status, amount = stored.amount, "Refund created");
        self.audit.log(
            AuditAction::RefundCreated
                .by(actor)
                .resource("refund", stored.id)
                .metadata(json!({
                    "payment_id": payment.id,
                    "amount": stored.amount,
                    "reason": stored.reason,
                    "status": stored.status,
                    "processor_reference_id": receipt.reference_id,
                })),
        );
        Ok(stored)
    }

    /// Resolves a payment held for review.
    ///
    /// Approval submits the payment to the processor under its original
    /// idempotency key; decline fails it without a processor call.
    ///
    /// # Errors
    ///
    /// [`PaymentError::NotInReview`] unless the payment is held,
    /// [`PaymentError::InsufficientPermissions`] for roles below admin, plus
    /// the charge-path failures on approval.
    #[instrument(
        skip(self, actor, request),
        fields(organization_id = %actor.organization_id, reviewer_id = %actor.user_id, payment_id = %payment_id)
    )]
    pub async fn review_payment(&self, actor: &Actor, payment_id: Uuid, request: &ReviewRequest) -> PaymentResult<Payment> {
        let decision = validate_review(request)?;
        let payment = self.payment_in_organization(actor, payment_id).await?;

        if !matches!(actor.role, Role::Owner | Role::Admin) {
            warn!(role = actor.role.as_str(), "Role may not resolve reviews");
            return Err(PaymentError::InsufficientPermissions);
        }
        if payment.status != PaymentStatus::RequiresReview {
            return Err(PaymentError::NotInReview(payment.status));
        }

        match decision {
            ReviewDecision::Decline => {
                let declined = self.ledger.decline_review(payment.id).await.map_err(|e| match e {
                    LedgerError::InvalidTransition(status) => PaymentError::NotInReview(status),
                    other => other.into(),
                })?;
                info!("Held payment declined");
                self.audit.log(
                    AuditAction::PaymentReviewDeclined
                        .by(actor)
                        .resource("payment", declined.id)
                        .metadata(json!({ "fraud_score": declined.fraud_score })),
                );
                Ok(declined)
            }
            ReviewDecision::Approve => self.release_held(actor, payment).await,
        }
    }

    async fn release_held(&self, actor: &Actor, payment: Payment) -> PaymentResult<Payment> {
        self.limits
            .check(payment.organization_id, payment.amount, Utc::now())
            .await?;

        let customer_id = self.ledger.customer_for_organization(payment.organization_id).await?;
        let params = charge_params(&payment, customer_id);
        let receipt = self
            .call_processor(self.processor.charge(&params))
            .await
            .map_err(|e| {
                error!(error = %e, "Processor charge failed for released payment");
                PaymentError::ChargeFailed(e)
            })?;

        let status = map_charge_status(&receipt);
        let released = self
            .ledger
            .attach_processor_result(payment.id, &receipt.reference_id, status)
            .await
            .map_err(|e| self.unreconciled_payment(actor, &payment, &receipt.reference_id, e))?;

        info!(reference_id = %receipt.reference_id, status = ?released.status, "Held payment approved");
        self.audit.log(
            AuditAction::PaymentReviewApproved
                .by(actor)
                .resource("payment", released.id)
                .metadata(json!({
                    "status": released.status,
                    "fraud_score": released.fraud_score,
                    "processor_reference_id": receipt.reference_id,
                })),
        );
        Ok(released)
    }

    /// Authenticates and applies a processor webhook.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Signature`] before anything is parsed or dispatched,
    /// [`PaymentError::InvalidPayload`] for a verified but unusable body,
    /// [`PaymentError::Secrets`] when the signing secret cannot be read.
    #[instrument(skip_all, fields(payload_len = payload.len()))]
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> PaymentResult<DispatchOutcome> {
        let secret = self
            .secrets
            .get_secret(&self.webhook.secret_path, &self.webhook.secret_key)
            .await
            .map_err(|e| {
                error!(error = %e, "Webhook signing secret unavailable");
                PaymentError::Secrets(e)
            })?;

        if let Err(e) = self
            .verifier
            .verify(payload, signature, secret.expose_secret().as_bytes(), Utc::now())
        {
            warn!(error = %e, "Webhook signature rejected");
            return Err(e.into());
        }

        let event = ProcessorEvent::parse(payload).map_err(|e| {
            warn!(error = %e, "Verified webhook has unusable payload");
            e
        })?;
        self.dispatcher.dispatch(&event).await
    }

    async fn payment_in_organization(&self, actor: &Actor, payment_id: Uuid) -> PaymentResult<Payment> {
        self.ledger
            .get_payment(payment_id)
            .await?
            .filter(|p| p.organization_id == actor.organization_id)
            .ok_or(PaymentError::PaymentNotFound)
    }

    /// Confirms the payment method belongs to the organization's processor
    /// customer and returns that customer id.
    async fn verify_payment_method(&self, organization_id: Uuid, payment_method_id: &str) -> PaymentResult<String> {
        let Some(customer_id) = self.ledger.customer_for_organization(organization_id).await? else {
            warn!(organization_id = %organization_id, "Organization has no processor customer");
            return Err(PaymentError::PaymentMethodNotFound);
        };

        match self.call_processor(self.processor.payment_method(payment_method_id)).await {
            Ok(method) if method.customer_id.as_deref() == Some(customer_id.as_str()) => Ok(customer_id),
            Ok(_) => {
                warn!(payment_method_id, "Payment method belongs to another customer");
                Err(PaymentError::PaymentMethodNotFound)
            }
            Err(ProcessorError::NotFound(_)) => {
                warn!(payment_method_id, "Payment method not found at processor");
                Err(PaymentError::PaymentMethodNotFound)
            }
            Err(e) => {
                error!(payment_method_id, error = %e, "Payment method lookup failed");
                Err(PaymentError::ChargeFailed(e))
            }
        }
    }

    async fn hold_for_review(
        &self,
        actor: &Actor,
        mut payment: Payment,
        charge: &ValidatedCharge,
        assessment: &FraudAssessment,
    ) -> PaymentResult<Payment> {
        payment.status = PaymentStatus::RequiresReview;

        let held = match self.ledger.insert_payment(payment).await {
            Ok(held) => held,
            Err(LedgerError::DuplicateIdempotencyKey) => {
                let existing = self
                    .ledger
                    .find_by_idempotency_key(actor.organization_id, &charge.idempotency_key)
                    .await?
                    .ok_or(PaymentError::Persistence(LedgerError::DuplicateIdempotencyKey))?;
                return replay(existing, charge);
            }
            Err(e) => return Err(e.into()),
        };

        warn!(
            payment_id = %held.id,
            score = assessment.score,
            signals = ?assessment.signals,
            "Payment held for fraud review"
        );
        self.audit.log(
            AuditAction::PaymentFlaggedFraud
                .by(actor)
                .resource("payment", held.id)
                .metadata(json!({
                    "fraud_score": assessment.score,
                    "signals": assessment.signals,
                    "amount": held.amount,
                    "currency": held.currency,
                })),
        );

        Err(PaymentError::FraudHold {
            payment_id: held.id,
            score: assessment.score,
        })
    }

    async fn call_processor<T>(&self, call: impl Future<Output = ProcessorResult<T>>) -> ProcessorResult<T> {
        match tokio::time::timeout(self.processor_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProcessorError::Timeout(
                u64::try_from(self.processor_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    fn unreconciled_payment(&self, actor: &Actor, payment: &Payment, reference: &str, source: LedgerError) -> PaymentError {
        error!(
            target: "payments::reconciliation",
            payment_id = %payment.id,
            organization_id = %payment.organization_id,
            reference_id = reference,
            amount = payment.amount,
            error = %source,
            "Processor charged but payment was not recorded"
        );
        self.audit.log(
            AuditAction::PaymentUnreconciled
                .by(actor)
                .resource("payment", payment.id)
                .metadata(json!({
                    "processor_reference_id": reference,
                    "amount": payment.amount,
                    "currency": payment.currency,
                    "idempotency_key": payment.idempotency_key,
                    "error": source.to_string(),
                })),
        );
        PaymentError::Unreconciled {
            resource: "payment",
            resource_id: payment.id,
            reference_id: reference.to_string(),
            source,
        }
    }

    fn unreconciled_refund(&self, actor: &Actor, refund: &Refund, reference: &str, source: LedgerError) -> PaymentError {
        error!(
            target: "payments::reconciliation",
            refund_id = %refund.id,
            payment_id = %refund.payment_id,
            reference_id = reference,
            amount = refund.amount,
            error = %source,
            "Processor refunded but refund was not recorded"
        );
        self.audit.log(
            AuditAction::RefundUnreconciled
                .by(actor)
                .resource("refund", refund.id)
                .metadata(json!({
                    "payment_id": refund.payment_id,
                    "processor_reference_id": reference,
                    "amount": refund.amount,
                    "error": source.to_string(),
                })),
        );
        PaymentError::Unreconciled {
            resource: "refund",
            resource_id: refund.id,
            reference_id: reference.to_string(),
            source,
        }
    }

    /// The reservation keeps counting against the refundable amount until an
    /// operator settles it against the processor.
    fn refund_in_doubt(&self, actor: &Actor, refund: &Refund, source: ProcessorError) -> PaymentError {
        error!(
            target: "payments::reconciliation",
            refund_id = %refund.id,
            payment_id = %refund.payment_id,
            amount = refund.amount,
            error = %source,
            "Processor refund outcome unknown; reservation kept pending"
        );
        self.audit.log(
            AuditAction::RefundUnreconciled
                .by(actor)
                .resource("refund", refund.id)
                .metadata(json!({
                    "payment_id": refund.payment_id,
                    "amount": refund.amount,
                    "error": source.to_string(),
                })),
        );
        PaymentError::RefundInDoubt {
            refund_id: refund.id,
            source,
        }
    }
}

fn replay(existing: Payment, charge: &ValidatedCharge) -> PaymentResult<Payment> {
    if !existing.matches_request(charge) {
        warn!(payment_id = %existing.id, "Idempotency key reused with different parameters");
        return Err(ValidationErrors::single("idempotencyKey", "already used with different parameters").into());
    }
    if existing.status == PaymentStatus::RequiresReview {
        return Err(PaymentError::FraudHold {
            payment_id: existing.id,
            score: existing.fraud_score,
        });
    }
    info!(payment_id = %existing.id, "Idempotent replay of recorded payment");
    Ok(existing)
}

fn new_payment(actor: &Actor, charge: ValidatedCharge, fraud_score: f64, now: DateTime<Utc>) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        organization_id: actor.organization_id,
        requester_id: actor.user_id,
        amount: charge.amount,
        currency: charge.currency,
        status: PaymentStatus::Pending,
        payment_method_id: charge.payment_method_id,
        processor_reference_id: None,
        idempotency_key: charge.idempotency_key,
        fraud_score,
        description: charge.description,
        metadata: charge.metadata,
        origin: actor.location.clone(),
        dispute: None,
        created_at: now,
        updated_at: now,
    }
}

fn charge_params(payment: &Payment, customer_id: Option<String>) -> ChargeParams {
    ChargeParams {
        amount: payment.amount,
        currency: payment.currency,
        payment_method_id: payment.payment_method_id.clone(),
        customer_id,
        description: payment.description.clone(),
        metadata: payment.metadata.clone(),
        idempotency_key: processor_idempotency_key(payment.organization_id, &payment.idempotency_key),
    }
}

/// Key sent to the processor for a charge. Client keys are only unique per
/// organization, while the processor's key space is account-wide.
pub fn processor_idempotency_key(organization_id: Uuid, key: &str) -> String {
    sha256_hex(format!("{organization_id}:{key}").as_bytes())
}

fn map_charge_status(receipt: &ProcessorReceipt) -> PaymentStatus {
    charge_status(&receipt.status).unwrap_or_else(|| {
        error!(
            reference_id = %receipt.reference_id,
            raw_status = %receipt.status,
            "Unrecognized processor charge status; recording as pending"
        );
        PaymentStatus::Pending
    })
}
