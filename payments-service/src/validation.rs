//! Structural and semantic validation of inbound requests.
//!
//! Every check runs; the resulting [`ValidationErrors`] lists all violations
//! rather than stopping at the first.

use crate::models::{
    ChargeRequest, Currency, RefundReason, RefundRequest, ReviewDecision, ReviewRequest, ValidatedCharge,
    ValidatedRefund,
};
use serde::Serialize;
use std::fmt;

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;
pub const MAX_METADATA_KEYS: usize = 50;
pub const MAX_METADATA_KEY_LEN: usize = 40;
pub const MAX_METADATA_VALUE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, reason);
        errors
    }

    fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.reason))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn check_amount(errors: &mut ValidationErrors, amount: i64) {
    if amount <= 0 {
        errors.push("amount", "must be a positive integer in minor units");
    }
}

/// Validates a charge request.
///
/// # Errors
///
/// Returns every violation found.
pub fn validate_charge(req: &ChargeRequest) -> Result<ValidatedCharge, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_amount(&mut errors, req.amount);

    let currency = req.currency.parse::<Currency>().ok();
    if currency.is_none() {
        errors.push("currency", "must be one of usd, eur, gbp");
    }

    if req.payment_method_id.trim().is_empty() {
        errors.push("paymentMethodId", "is required");
    }

    if req.idempotency_key.trim().is_empty() {
        errors.push("idempotencyKey", "is required");
    } else if req.idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        errors.push(
            "idempotencyKey",
            format!("must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"),
        );
    }

    if req.metadata.len() > MAX_METADATA_KEYS {
        errors.push("metadata", format!("must have at most {MAX_METADATA_KEYS} keys"));
    }
    for (key, value) in &req.metadata {
        if key.is_empty() || key.chars().count() > MAX_METADATA_KEY_LEN {
            errors.push(
                format!("metadata.{key}"),
                format!("key must be 1 to {MAX_METADATA_KEY_LEN} characters"),
            );
        }
        if value.chars().count() > MAX_METADATA_VALUE_LEN {
            errors.push(
                format!("metadata.{key}"),
                format!("value must be at most {MAX_METADATA_VALUE_LEN} characters"),
            );
        }
    }

    match currency {
        Some(currency) if errors.is_empty() => Ok(ValidatedCharge {
            amount: req.amount,
            currency,
            payment_method_id: req.payment_method_id.trim().to_string(),
            description: req.description.clone().filter(|d| !d.is_empty()),
            metadata: req.metadata.clone(),
            idempotency_key: req.idempotency_key.clone(),
        }),
        _ => Err(errors),
    }
}

/// Validates a refund request.
///
/// # Errors
///
/// Returns every violation found.
pub fn validate_refund(req: &RefundRequest) -> Result<ValidatedRefund, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_amount(&mut errors, req.amount);

    let reason = req.reason.parse::<RefundReason>().ok();
    if reason.is_none() {
        errors.push("reason", "must be one of customer_request, duplicate, fraudulent");
    }

    match reason {
        Some(reason) => errors.into_result(|| ValidatedRefund {
            amount: req.amount,
            reason,
        }),
        None => Err(errors),
    }
}

/// Validates a review decision.
///
/// # Errors
///
/// Returns a violation on `decision` if it is neither `approve` nor `decline`.
pub fn validate_review(req: &ReviewRequest) -> Result<ReviewDecision, ValidationErrors> {
    match req.decision.as_str() {
        "approve" => Ok(ReviewDecision::Approve),
        "decline" => Ok(ReviewDecision::Decline),
        _ => Err(ValidationErrors::single("decision", "must be one of approve, decline")),
    }
}
