//! Authentication of processor webhooks.
//!
//! The signature header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`. Each
//! `v1` value is an HMAC-SHA256 over `"{t}.{payload}"` keyed with the shared
//! signing secret. Multiple `v1` values appear while a secret is being rolled.

use chrono::{DateTime, Utc};
use crypto::signing::{hmac_sha256_hex, verify_hmac_sha256_hex};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "Processor-Signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    MissingHeader,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("No v1 signatures in header")]
    NoSignatures,

    #[error("Timestamp {timestamp} outside tolerance of {tolerance_secs}s")]
    TimestampOutsideTolerance { timestamp: i64, tolerance_secs: i64 },

    #[error("No signature matches the payload")]
    Mismatch,

    #[error("Signing secret unusable: {0}")]
    InvalidSecret(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parses the header. Unknown schemes (anything but `t` and `v1`) are ignored.
    ///
    /// # Errors
    ///
    /// Fails if the timestamp is missing or not an integer, or no `v1` value is present.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((name, value)) = part.trim().split_once('=') else {
                return Err(SignatureError::MalformedHeader);
            };
            match name {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(SignatureError::NoSignatures);
        }
        Ok(Self { timestamp, signatures })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WebhookVerifier {
    tolerance_secs: i64,
}

impl Default for WebhookVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECS)
    }
}

impl WebhookVerifier {
    pub fn new(tolerance_secs: i64) -> Self {
        Self { tolerance_secs }
    }

    /// Verifies `payload` against the signature header.
    ///
    /// # Errors
    ///
    /// Any [`SignatureError`]; the payload must not be acted on.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        secret: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let header = SignatureHeader::parse(header.ok_or(SignatureError::MissingHeader)?)?;

        let age = now.timestamp().saturating_sub(header.timestamp);
        if age.abs() > self.tolerance_secs {
            return Err(SignatureError::TimestampOutsideTolerance {
                timestamp: header.timestamp,
                tolerance_secs: self.tolerance_secs,
            });
        }

        let signed = signed_payload(header.timestamp, payload);
        let candidates: Vec<&str> = header.signatures.iter().map(String::as_str).collect();
        match verify_hmac_sha256_hex(secret, &signed, &candidates) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SignatureError::Mismatch),
            Err(e) => Err(SignatureError::InvalidSecret(e.to_string())),
        }
    }
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);
    signed
}

/// Builds a signature header for `payload`, as the processor would.
///
/// # Errors
///
/// Fails if the secret is empty.
pub fn sign_payload(payload: &[u8], secret: &[u8], timestamp: i64) -> Result<String, SignatureError> {
    let signature = hmac_sha256_hex(secret, &signed_payload(timestamp, payload))
        .map_err(|e| SignatureError::InvalidSecret(e.to_string()))?;
    Ok(format!("t={timestamp},v1={signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn test_header_parsing() {
        let header = SignatureHeader::parse("t=1700000000,v1=abc,v0=legacy,v1=def").unwrap();
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.signatures, vec!["abc".to_string(), "def".to_string()]);

        assert_eq!(SignatureHeader::parse("v1=abc"), Err(SignatureError::MalformedHeader));
        assert_eq!(SignatureHeader::parse("t=nope,v1=abc"), Err(SignatureError::MalformedHeader));
        assert_eq!(SignatureHeader::parse("t=1"), Err(SignatureError::NoSignatures));
        assert_eq!(SignatureHeader::parse("garbage"), Err(SignatureError::MalformedHeader));
    }

    #[test]
    fn test_valid_signature_verifies() {
        let now = Utc::now();
        let header = sign_payload(PAYLOAD, SECRET, now.timestamp()).unwrap();
        WebhookVerifier::default()
            .verify(PAYLOAD, Some(&header), SECRET, now)
            .unwrap();
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let now = Utc::now();
        let header = sign_payload(PAYLOAD, SECRET, now.timestamp()).unwrap();
        let rolled = header.replacen(",v1=", ",v1=00ff,v1=", 1);
        WebhookVerifier::default()
            .verify(PAYLOAD, Some(&rolled), SECRET, now)
            .unwrap();
    }

    #[test]
    fn test_altered_payload_rejected() {
        let now = Utc::now();
        let header = sign_payload(PAYLOAD, SECRET, now.timestamp()).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.payment_failed"}"#;
        assert_eq!(
            WebhookVerifier::default().verify(tampered, Some(&header), SECRET, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let header = sign_payload(PAYLOAD, b"other_secret", now.timestamp()).unwrap();
        assert_eq!(
            WebhookVerifier::default().verify(PAYLOAD, Some(&header), SECRET, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_timestamp_tolerance_both_directions() {
        let now = Utc::now();
        let verifier = WebhookVerifier::default();

        let stale = sign_payload(PAYLOAD, SECRET, now.timestamp() - 301).unwrap();
        assert!(matches!(
            verifier.verify(PAYLOAD, Some(&stale), SECRET, now),
            Err(SignatureError::TimestampOutsideTolerance { .. })
        ));

        let future = sign_payload(PAYLOAD, SECRET, now.timestamp() + 301).unwrap();
        assert!(matches!(
            verifier.verify(PAYLOAD, Some(&future), SECRET, now),
            Err(SignatureError::TimestampOutsideTolerance { .. })
        ));

        let edge = sign_payload(PAYLOAD, SECRET, now.timestamp() - 300).unwrap();
        verifier.verify(PAYLOAD, Some(&edge), SECRET, now).unwrap();
    }

    #[test]
    fn test_missing_header_and_empty_secret() {
        let now = Utc::now();
        let verifier = WebhookVerifier::default();
        assert_eq!(
            verifier.verify(PAYLOAD, None, SECRET, now),
            Err(SignatureError::MissingHeader)
        );

        let header = sign_payload(PAYLOAD, SECRET, now.timestamp()).unwrap();
        assert!(matches!(
            verifier.verify(PAYLOAD, Some(&header), b"", now),
            Err(SignatureError::InvalidSecret(_))
        ));
    }
}
