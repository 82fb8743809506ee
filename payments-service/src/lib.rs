//! Payment authorization and reconciliation core
//!
//! This crate decides whether a charge may proceed and records its outcome:
//! - Request validation reporting every violated field
//! - Organization spend caps over a rolling window
//! - Heuristic fraud scoring with a human review gate
//! - Idempotent charges and refunds through a [`ProcessorClient`]
//! - A [`Ledger`] of payments and refunds whose statuses only move forward
//! - Signed processor webhooks applied at most once per event id
//! - Audit entries for every money-moving or security-relevant action
//!
//! # Charge flow
//!
//! ```text
//! validate -> idempotency lookup -> spend cap -> payment-method ownership
//!          -> fraud score -> (held for review | processor charge -> ledger)
//! ```
//!
//! A payment the processor charged but the ledger could not record is reported
//! as [`PaymentError::Unreconciled`] and logged on the
//! `payments::reconciliation` target for an operator.

pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod fraud;
pub mod ledger;
pub mod limits;
pub mod models;
pub mod processor;
pub mod service;
pub mod validation;
pub mod webhook;

pub use config::PaymentsConfig;
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use error::{PaymentError, PaymentResult};
pub use ledger::{InMemoryLedger, Ledger, LedgerError};
pub use models::*;
pub use processor::{HttpProcessorClient, InMemoryProcessor, ProcessorClient, ProcessorError};
pub use service::PaymentService;
pub use webhook::{WebhookVerifier, SIGNATURE_HEADER};
