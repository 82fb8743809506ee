//! Cryptographic primitives for the payments engine
//!
//! - Constant-time comparisons ([`constant_time`])
//! - HMAC-SHA256 signing and verification ([`signing`]) used to authenticate
//!   processor webhooks
//!
//! # Example
//!
//! ```rust
//! use crypto::signing::{hmac_sha256_hex, verify_hmac_sha256_hex};
//!
//! let tag = hmac_sha256_hex(b"whsec_test", b"1700000000.{}").unwrap();
//! assert!(verify_hmac_sha256_hex(b"whsec_test", b"1700000000.{}", &[tag.as_str()]).unwrap());
//! ```

pub mod constant_time;
pub mod error;
pub mod signing;

pub use error::*;
