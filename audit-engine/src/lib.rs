//! Audit logging for the payments engine
//!
//! Records who did what to which resource, for compliance review:
//! payment creation, fraud holds, refunds, review decisions, and reconciliation
//! failures that need an operator.
//!
//! Writing an audit entry is best-effort and must never hold up the request
//! that produced it. [`AuditLogger`] queues entries for a background task that
//! writes them to an [`AuditSink`] with a timeout.
//!
//! # Example
//!
//! ```rust
//! use audit_engine::{AuditEntry, AuditLogger, InMemoryAuditSink};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let sink = InMemoryAuditSink::new();
//!     let audit = AuditLogger::spawn(Arc::new(sink.clone()));
//!
//!     audit.log(
//!         AuditEntry::new("PAYMENT_CREATED")
//!             .resource("payment", "7f1c")
//!             .metadata(json!({ "amount": 1000, "currency": "usd" })),
//!     );
//!
//!     audit.flush().await.unwrap();
//!     assert_eq!(sink.entries().await.len(), 1);
//! }
//! ```

pub mod entry;
pub mod error;
pub mod logger;
pub mod sink;

pub use entry::*;
pub use error::*;
pub use logger::*;
pub use sink::*;
