use crate::error::{ApiError, ApiResult};
use crate::middleware::signature_header;
use crate::server::PaymentsServer;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

/// Processor notification endpoint.
///
/// Acknowledges with 200 once the event is applied or recognized as a
/// duplicate; any error response makes the processor redeliver.
pub async fn processor_webhook(
    State(server): State<PaymentsServer>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<Value>> {
    let body = body.map_err(|e| ApiError::invalid_payload(e.body_text()))?;
    let signature = headers.get(signature_header()).and_then(|v| v.to_str().ok());

    let outcome = server.service.handle_webhook(&body, signature).await?;
    debug!(?outcome, "Webhook acknowledged");

    Ok(Json(json!({ "received": true })))
}
