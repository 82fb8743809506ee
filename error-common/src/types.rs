use crate::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Failure body returned by every endpoint: `{"error": <CODE>, "details"?: <string>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: ErrorCode) -> Self {
        Self { error, details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<ErrorCode> for ErrorBody {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

/// Errors that know which wire code they surface as.
pub trait HasErrorCode {
    fn error_code(&self) -> ErrorCode;

    /// Client-safe detail string. Defaults to none so internal messages never leak.
    fn public_details(&self) -> Option<String> {
        None
    }

    fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error_code(),
            details: self.public_details(),
        }
    }
}
