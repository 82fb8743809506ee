use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use error_common::{ErrorBody, ErrorCode, HasErrorCode};
use payments_service::PaymentError;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Errors surfaced by HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Authentication error: {message}")]
    Unauthenticated { message: String },

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },

    #[error("Invalid webhook body: {message}")]
    InvalidPayload { message: String },
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self::InvalidBody {
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.error_code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl HasErrorCode for ApiError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::Payment(e) => e.error_code(),
            ApiError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            ApiError::InvalidBody { .. } => ErrorCode::ValidationError,
            ApiError::InvalidPayload { .. } => ErrorCode::InvalidPayload,
        }
    }

    fn public_details(&self) -> Option<String> {
        match self {
            ApiError::Payment(e) => e.public_details(),
            ApiError::InvalidBody { message } => Some(message.clone()),
            ApiError::Unauthenticated { .. } | ApiError::InvalidPayload { .. } => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();
        let body: ErrorBody = self.to_body();

        // Log the error with correlation ID
        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_code = body.error.as_str(),
                status_code = status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_code = body.error.as_str(),
                status_code = status_code.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let mut response = (status_code, Json(body)).into_response();
        if let Ok(value) = error_id.parse() {
            response.headers_mut().insert("x-error-id", value);
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
