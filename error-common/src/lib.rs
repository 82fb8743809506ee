//! Common error handling utilities for the payments engine
//!
//! Every failure that crosses the API boundary is reported with one of the
//! [`ErrorCode`] values and the [`ErrorBody`] shape:
//!
//! ```json
//! { "error": "PAYMENT_LIMIT_EXCEEDED", "details": "optional client-safe text" }
//! ```
//!
//! Library crates keep their own `thiserror` enums and implement
//! [`HasErrorCode`] to decide how they surface on the wire.
//!
//! # Example
//!
//! ```rust
//! use error_common::{ErrorBody, ErrorCode};
//!
//! let body = ErrorBody::new(ErrorCode::RefundWindowExpired);
//! assert_eq!(ErrorCode::RefundWindowExpired.http_status(), 400);
//! assert_eq!(
//!     serde_json::to_string(&body).unwrap(),
//!     r#"{"error":"REFUND_WINDOW_EXPIRED"}"#
//! );
//! ```

pub mod codes;
pub mod types;

pub use codes::*;
pub use types::*;
