// Error codes implementation
// Wire-level error codes shared by the payments core and the HTTP adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error code returned in the `error` field of every failure body.
///
/// The serialized form is the SCREAMING_SNAKE_CASE name and is part of the public API,
/// so variants must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input
    ValidationError,
    InvalidPayload,

    // Identity and policy
    Unauthenticated,
    InvalidSignature,
    InsufficientPermissions,
    PaymentLimitExceeded,
    PaymentMethodNotFound,
    PaymentRequiresReview,

    // Resources
    PaymentNotFound,
    PaymentNotInReview,
    RefundExceedsPayment,
    RefundWindowExpired,

    // Upstream processor
    PaymentFailed,
    RefundFailed,

    // Everything else
    ServerError,
}

impl ErrorCode {
    /// HTTP status code the code is reported with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::ValidationError
            | ErrorCode::InvalidPayload
            | ErrorCode::RefundExceedsPayment
            | ErrorCode::RefundWindowExpired => 400,
            ErrorCode::Unauthenticated | ErrorCode::InvalidSignature => 401,
            ErrorCode::InsufficientPermissions
            | ErrorCode::PaymentLimitExceeded
            | ErrorCode::PaymentMethodNotFound
            | ErrorCode::PaymentRequiresReview => 403,
            ErrorCode::PaymentNotFound => 404,
            ErrorCode::PaymentNotInReview => 409,
            ErrorCode::PaymentFailed | ErrorCode::RefundFailed => 502,
            ErrorCode::ServerError => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::PaymentLimitExceeded => "PAYMENT_LIMIT_EXCEEDED",
            ErrorCode::PaymentMethodNotFound => "PAYMENT_METHOD_NOT_FOUND",
            ErrorCode::PaymentRequiresReview => "PAYMENT_REQUIRES_REVIEW",
            ErrorCode::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ErrorCode::PaymentNotInReview => "PAYMENT_NOT_IN_REVIEW",
            ErrorCode::RefundExceedsPayment => "REFUND_EXCEEDS_PAYMENT",
            ErrorCode::RefundWindowExpired => "REFUND_WINDOW_EXPIRED",
            ErrorCode::PaymentFailed => "PAYMENT_FAILED",
            ErrorCode::RefundFailed => "REFUND_FAILED",
            ErrorCode::ServerError => "SERVER_ERROR",
        }
    }

    /// Whether a client may resubmit the identical request later.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::PaymentFailed | ErrorCode::RefundFailed | ErrorCode::ServerError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_matches_as_str() {
        for code in [
            ErrorCode::ValidationError,
            ErrorCode::PaymentLimitExceeded,
            ErrorCode::RefundWindowExpired,
            ErrorCode::InvalidSignature,
            ErrorCode::ServerError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn status_mapping_follows_api_table() {
        assert_eq!(ErrorCode::PaymentRequiresReview.http_status(), 403);
        assert_eq!(ErrorCode::RefundExceedsPayment.http_status(), 400);
        assert_eq!(ErrorCode::PaymentNotFound.http_status(), 404);
        assert_eq!(ErrorCode::RefundFailed.http_status(), 502);
        assert_eq!(ErrorCode::InvalidSignature.http_status(), 401);
    }
}
