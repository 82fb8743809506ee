//! Audit actions recorded by the payments core.

use crate::models::Actor;
use audit_engine::AuditEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    PaymentCreated,
    PaymentFlaggedFraud,
    PaymentUnreconciled,
    PaymentReviewApproved,
    PaymentReviewDeclined,
    PaymentStatusReconciled,
    PaymentDisputed,
    RefundCreated,
    RefundUnreconciled,
    RefundStatusReconciled,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::PaymentCreated => "PAYMENT_CREATED",
            AuditAction::PaymentFlaggedFraud => "PAYMENT_FLAGGED_FRAUD",
            AuditAction::PaymentUnreconciled => "PAYMENT_UNRECONCILED",
            AuditAction::PaymentReviewApproved => "PAYMENT_REVIEW_APPROVED",
            AuditAction::PaymentReviewDeclined => "PAYMENT_REVIEW_DECLINED",
            AuditAction::PaymentStatusReconciled => "PAYMENT_STATUS_RECONCILED",
            AuditAction::PaymentDisputed => "PAYMENT_DISPUTED",
            AuditAction::RefundCreated => "REFUND_CREATED",
            AuditAction::RefundUnreconciled => "REFUND_UNRECONCILED",
            AuditAction::RefundStatusReconciled => "REFUND_STATUS_RECONCILED",
        }
    }

    /// Entry performed by an authenticated user.
    pub fn by(self, actor: &Actor) -> AuditEntry {
        AuditEntry::new(self.as_str())
            .actor(actor.user_id)
            .organization(actor.organization_id)
    }

    /// Entry performed by the system (webhook reconciliation).
    pub fn system(self) -> AuditEntry {
        AuditEntry::new(self.as_str())
    }
}
