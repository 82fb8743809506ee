use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit storage error: {0}")]
    StorageError(String),

    #[error("Audit write timed out after {0} ms")]
    Timeout(u64),

    #[error("Audit logger is shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, AuditError>;
