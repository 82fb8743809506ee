//! Boundary to the external payment processor.
//!
//! The processor owns money movement and idempotency by key. Adapters return
//! the processor's raw status strings; [`charge_status`] and [`refund_status`]
//! are the single mapping table into internal statuses.

pub mod http;
pub mod in_memory;

pub use http::HttpProcessorClient;
pub use in_memory::InMemoryProcessor;

use crate::models::{Currency, Metadata, PaymentStatus, RefundReason, RefundStatus};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Declined ({code}): {message}")]
    Declined { code: String, message: String },

    #[error("Processor API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Processor call timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid processor response: {0}")]
    InvalidResponse(String),

    #[error("Processor configuration error: {0}")]
    Configuration(String),
}

impl ProcessorError {
    /// True when the request may have been applied by the processor even
    /// though no usable answer came back.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            ProcessorError::Timeout(_) | ProcessorError::Transport(_) | ProcessorError::InvalidResponse(_)
        )
    }
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeParams {
    pub amount: i64,
    pub currency: Currency,
    pub payment_method_id: String,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundParams {
    pub charge_reference_id: String,
    pub amount: i64,
    pub reason: RefundReason,
    pub idempotency_key: String,
}

/// Processor reference and raw status for a charge or refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorReceipt {
    pub reference_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethodInfo {
    pub id: String,
    pub customer_id: Option<String>,
}

#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// Creates and confirms a charge. Repeating the same idempotency key returns the original charge.
    async fn charge(&self, params: &ChargeParams) -> ProcessorResult<ProcessorReceipt>;

    /// Refunds part or all of a charge. Repeating the same idempotency key returns the original refund.
    async fn refund(&self, params: &RefundParams) -> ProcessorResult<ProcessorReceipt>;

    async fn payment_method(&self, id: &str) -> ProcessorResult<PaymentMethodInfo>;
}

/// Maps a processor charge status. `None` means the status is not recognized.
pub fn charge_status(raw: &str) -> Option<PaymentStatus> {
    match raw {
        "succeeded" => Some(PaymentStatus::Succeeded),
        "processing" | "requires_action" | "requires_capture" | "requires_confirmation" => {
            Some(PaymentStatus::Pending)
        }
        "requires_payment_method" | "canceled" => Some(PaymentStatus::Failed),
        _ => None,
    }
}

/// Maps a processor refund status. `None` means the status is not recognized.
pub fn refund_status(raw: &str) -> Option<RefundStatus> {
    match raw {
        "pending" | "requires_action" => Some(RefundStatus::Pending),
        "succeeded" => Some(RefundStatus::Succeeded),
        "failed" => Some(RefundStatus::Failed),
        "canceled" => Some(RefundStatus::Canceled),
        _ => None,
    }
}
