//! REST adapter for a Stripe-compatible processor API.
//!
//! Requests are form-encoded, authenticated with a bearer API key, and carry
//! an `Idempotency-Key` header on every mutating call.

use super::{
    ChargeParams, PaymentMethodInfo, ProcessorClient, ProcessorError, ProcessorReceipt, ProcessorResult,
    RefundParams,
};
use crate::models::RefundReason;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct ReceiptBody {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodBody {
    id: String,
    #[serde(default)]
    customer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpProcessorClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpProcessorClient {
    /// Creates a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Configuration`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: SecretString, timeout: Duration) -> ProcessorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessorError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.api_key.expose_secret())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProcessorResult<T> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ProcessorError::Transport(format!("request timed out: {e}"))
            } else {
                ProcessorError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| ProcessorError::InvalidResponse(e.to_string()));
        }

        let detail = serde_json::from_str::<ErrorEnvelope>(&body).unwrap_or_default().error;
        let message = detail.message.unwrap_or_else(|| status.to_string());
        warn!(status = status.as_u16(), code = ?detail.code, "Processor request rejected");

        Err(match status {
            StatusCode::NOT_FOUND => ProcessorError::NotFound(message),
            StatusCode::PAYMENT_REQUIRED => ProcessorError::Declined {
                code: detail
                    .decline_code
                    .or(detail.code)
                    .unwrap_or_else(|| "card_declined".to_string()),
                message,
            },
            _ => ProcessorError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

fn refund_reason_param(reason: RefundReason) -> &'static str {
    match reason {
        RefundReason::CustomerRequest => "requested_by_customer",
        RefundReason::Duplicate => "duplicate",
        RefundReason::Fraudulent => "fraudulent",
    }
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn charge(&self, params: &ChargeParams) -> ProcessorResult<ProcessorReceipt> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), params.amount.to_string()),
            ("currency".to_string(), params.currency.as_str().to_string()),
            ("payment_method".to_string(), params.payment_method_id.clone()),
            ("confirm".to_string(), "true".to_string()),
        ];
        if let Some(customer) = &params.customer_id {
            form.push(("customer".to_string(), customer.clone()));
        }
        if let Some(description) = &params.description {
            form.push(("description".to_string(), description.clone()));
        }
        for (key, value) in &params.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        debug!(amount = params.amount, currency = %params.currency, "Creating processor charge");
        let request = self
            .client
            .post(self.url("/v1/payment_intents"))
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&form);
        let body: ReceiptBody = self.send(request).await?;

        Ok(ProcessorReceipt {
            reference_id: body.id,
            status: body.status,
        })
    }

    async fn refund(&self, params: &RefundParams) -> ProcessorResult<ProcessorReceipt> {
        let form = [
            ("payment_intent", params.charge_reference_id.clone()),
            ("amount", params.amount.to_string()),
            ("reason", refund_reason_param(params.reason).to_string()),
        ];

        debug!(charge = %params.charge_reference_id, amount = params.amount, "Creating processor refund");
        let request = self
            .client
            .post(self.url("/v1/refunds"))
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&form);
        let body: ReceiptBody = self.send(request).await?;

        Ok(ProcessorReceipt {
            reference_id: body.id,
            status: body.status,
        })
    }

    async fn payment_method(&self, id: &str) -> ProcessorResult<PaymentMethodInfo> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ProcessorError::NotFound(format!("payment method {id}")));
        }
        let request = self.client.get(self.url(&format!("/v1/payment_methods/{id}")));
        let body: PaymentMethodBody = self.send(request).await?;
        Ok(PaymentMethodInfo {
            id: body.id,
            customer_id: body.customer,
        })
    }
}
