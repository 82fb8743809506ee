//! Request extractors that report failures in the API error shape.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use payments_service::PaymentError;
use serde::de::DeserializeOwned;
use tracing::debug;

/// JSON body whose rejections become `VALIDATION_ERROR` responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid_body(rejection.body_text())),
        }
    }
}

/// Payment path parameters; an id that does not parse names no payment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(path = %parts.uri.path(), reason = %rejection.body_text(), "Unparseable path parameter");
                Err(ApiError::Payment(PaymentError::PaymentNotFound))
            }
        }
    }
}
