use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
