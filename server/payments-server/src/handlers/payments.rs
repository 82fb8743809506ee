//! Charge, refund and review endpoints.

use crate::error::ApiResult;
use crate::middleware::{ApiJson, ApiPath, AuthContext};
use crate::server::PaymentsServer;
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use payments_service::{ChargeRequest, Payment, Refund, RefundRequest, ReviewRequest};
use tracing::instrument;
use uuid::Uuid;

/// Create a payment.
///
/// Returns 201 for new charges and for idempotent replays alike.
#[instrument(skip_all, fields(organization_id = %actor.organization_id, idempotency_key = %request.idempotency_key))]
pub async fn create_payment(
    State(server): State<PaymentsServer>,
    AuthContext(actor): AuthContext,
    ApiJson(request): ApiJson<ChargeRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let payment = server.service.create_payment(&actor, &request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[instrument(skip_all, fields(organization_id = %actor.organization_id, payment_id = %payment_id))]
pub async fn create_refund(
    State(server): State<PaymentsServer>,
    AuthContext(actor): AuthContext,
    ApiPath(payment_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RefundRequest>,
) -> ApiResult<(StatusCode, Json<Refund>)> {
    let refund = server.service.create_refund(&actor, payment_id, &request).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

/// Approve or decline a payment held for fraud review.
#[instrument(skip_all, fields(organization_id = %actor.organization_id, payment_id = %payment_id))]
pub async fn review_payment(
    State(server): State<PaymentsServer>,
    AuthContext(actor): AuthContext,
    ApiPath(payment_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ReviewRequest>,
) -> ApiResult<Json<Payment>> {
    let payment = server.service.review_payment(&actor, payment_id, &request).await?;
    Ok(Json(payment))
}
