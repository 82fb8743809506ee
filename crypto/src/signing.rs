//! HMAC-SHA256 signing used for webhook authentication, plus plain SHA-256
//! digests for deriving stable identifiers.

use crate::constant_time::ct_contains;
use crate::error::{CryptoError, CryptoResult};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Computes the raw HMAC-SHA256 tag of `message` under `key`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if the key is empty.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
    if key.is_empty() {
        return Err(CryptoError::InvalidKey("HMAC key must not be empty".to_string()));
    }
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Lower-case hex encoding of [`hmac_sha256`].
///
/// # Errors
///
/// See [`hmac_sha256`].
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> CryptoResult<String> {
    hmac_sha256(key, message).map(hex::encode)
}

/// Verifies that at least one hex-encoded candidate is a valid tag for `message`.
///
/// Candidates that are not valid hex are treated as non-matching. Comparison is
/// constant-time across all candidates.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if the key is empty. A mismatch is not an
/// error; it yields `Ok(false)`.
pub fn verify_hmac_sha256_hex(key: &[u8], message: &[u8], candidates: &[&str]) -> CryptoResult<bool> {
    let expected = hmac_sha256(key, message)?;
    let decoded: Vec<Vec<u8>> = candidates
        .iter()
        .map(|c| hex::decode(c).unwrap_or_default())
        .collect();
    let refs: Vec<&[u8]> = decoded.iter().map(Vec::as_slice).collect();
    Ok(ct_contains(&expected, &refs))
}

/// Lower-case hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
