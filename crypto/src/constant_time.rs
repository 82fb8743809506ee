//! Constant-time operations to prevent timing attacks
//!
//! Signature comparisons MUST use these helpers: with `==` an attacker can
//! recover a valid MAC byte by byte by measuring how long rejection takes.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices
///
/// Returns true if slices are equal, false otherwise.
/// Execution time is independent of the slice contents.
///
/// # Example
///
/// ```rust
/// use crypto::constant_time::ct_eq;
///
/// assert!(ct_eq(b"v1-signature", b"v1-signature"));
/// assert!(!ct_eq(b"v1-signature", b"v1-signaturf"));
/// ```
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    // Early length check is safe - length is not secret
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Returns true if any candidate equals `expected`.
///
/// Every candidate is compared, so the position of a match is not observable.
pub fn ct_contains(expected: &[u8], candidates: &[&[u8]]) -> bool {
    candidates
        .iter()
        .fold(false, |found, candidate| ct_eq(expected, candidate) | found)
}
