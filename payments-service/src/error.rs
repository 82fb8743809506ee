use crate::events::EventParseError;
use crate::ledger::LedgerError;
use crate::models::PaymentStatus;
use crate::processor::ProcessorError;
use crate::validation::ValidationErrors;
use crate::webhook::SignatureError;
use error_common::{ErrorCode, HasErrorCode};
use secrets_service::SecretsError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Payment limit exceeded: {current} + {requested} > {cap}")]
    LimitExceeded { current: i64, requested: i64, cap: i64 },

    #[error("Payment method not found for organization")]
    PaymentMethodNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Payment {payment_id} held for review (score {score:.2})")]
    FraudHold { payment_id: Uuid, score: f64 },

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("Payment is {0:?}, not awaiting review")]
    NotInReview(PaymentStatus),

    #[error("Refund exceeds payment: {refunded} refunded + {requested} requested > {amount}")]
    RefundExceedsPayment { refunded: i64, requested: i64, amount: i64 },

    #[error("Refund window expired")]
    RefundWindowExpired,

    #[error("Charge failed: {0}")]
    ChargeFailed(ProcessorError),

    #[error("Refund failed: {0}")]
    RefundFailed(ProcessorError),

    /// The processor may have refunded; the reservation stays pending.
    #[error("Refund {refund_id} outcome unknown: {source}")]
    RefundInDoubt { refund_id: Uuid, source: ProcessorError },

    #[error("Ledger error: {0}")]
    Persistence(#[from] LedgerError),

    /// The processor moved money but the local record could not be written.
    #[error("Unreconciled {resource} {resource_id} at processor reference {reference_id}: {source}")]
    Unreconciled {
        resource: &'static str,
        resource_id: Uuid,
        reference_id: String,
        source: LedgerError,
    },

    #[error("Webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(#[from] EventParseError),

    #[error("Webhook event {0} is being processed by another delivery")]
    EventInFlight(String),

    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),
}

pub type PaymentResult<T> = Result<T, PaymentError>;

impl HasErrorCode for PaymentError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PaymentError::Validation(_) => ErrorCode::ValidationError,
            PaymentError::LimitExceeded { .. } => ErrorCode::PaymentLimitExceeded,
            PaymentError::PaymentMethodNotFound => ErrorCode::PaymentMethodNotFound,
            PaymentError::InsufficientPermissions => ErrorCode::InsufficientPermissions,
            PaymentError::FraudHold { .. } => ErrorCode::PaymentRequiresReview,
            PaymentError::PaymentNotFound => ErrorCode::PaymentNotFound,
            PaymentError::NotInReview(_) => ErrorCode::PaymentNotInReview,
            PaymentError::RefundExceedsPayment { .. } => ErrorCode::RefundExceedsPayment,
            PaymentError::RefundWindowExpired => ErrorCode::RefundWindowExpired,
            PaymentError::ChargeFailed(_) => ErrorCode::PaymentFailed,
            PaymentError::RefundFailed(_) => ErrorCode::RefundFailed,
            PaymentError::Signature(_) => ErrorCode::InvalidSignature,
            PaymentError::InvalidPayload(_) => ErrorCode::InvalidPayload,
            PaymentError::Persistence(_)
            | PaymentError::Unreconciled { .. }
            | PaymentError::RefundInDoubt { .. }
            | PaymentError::EventInFlight(_)
            | PaymentError::Secrets(_) => ErrorCode::ServerError,
        }
    }

    fn public_details(&self) -> Option<String> {
        match self {
            PaymentError::Validation(errors) => Some(errors.to_string()),
            PaymentError::NotInReview(status) => Some(format!("payment status is {status:?}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(
            PaymentError::LimitExceeded {
                current: 1,
                requested: 1,
                cap: 1
            }
            .error_code()
            .http_status(),
            403
        );
        assert_eq!(
            PaymentError::ChargeFailed(ProcessorError::Timeout(10)).error_code(),
            ErrorCode::PaymentFailed
        );
        assert_eq!(
            PaymentError::RefundFailed(ProcessorError::Timeout(10)).error_code(),
            ErrorCode::RefundFailed
        );
        assert_eq!(
            PaymentError::Unreconciled {
                resource: "payment",
                resource_id: Uuid::nil(),
                reference_id: "pi_1".to_string(),
                source: LedgerError::Unavailable("down".to_string()),
            }
            .error_code(),
            ErrorCode::ServerError
        );
        assert_eq!(
            PaymentError::RefundInDoubt {
                refund_id: Uuid::nil(),
                source: ProcessorError::Timeout(100),
            }
            .error_code(),
            ErrorCode::ServerError
        );
        assert_eq!(
            PaymentError::Signature(SignatureError::Mismatch).error_code().http_status(),
            401
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = PaymentError::Persistence(LedgerError::Unavailable("db password wrong".to_string()));
        let body = err.to_body();
        assert_eq!(body.error, ErrorCode::ServerError);
        assert!(body.details.is_none());

        let validation = PaymentError::Validation(ValidationErrors::single("amount", "must be positive"));
        assert_eq!(validation.to_body().details.as_deref(), Some("amount: must be positive"));
    }
}
