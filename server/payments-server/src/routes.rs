use crate::{
    handlers::{health, payments, webhooks},
    server::PaymentsServer,
};
use axum::{
    routing::{get, post},
    Router,
};

pub mod paths {
    pub const HEALTH: &str = "/health";

    pub mod payments {
        pub const PAYMENTS: &str = "/api/v1/payments";
        pub const REFUND: &str = "/api/v1/payments/:id/refund";
        pub const REVIEW: &str = "/api/v1/payments/:id/review";
    }

    pub mod webhooks {
        pub const PROCESSOR: &str = "/webhooks/processor";
    }
}

pub fn health_routes() -> Router<PaymentsServer> {
    Router::new().route(paths::HEALTH, get(health::health_check))
}

pub fn payment_routes() -> Router<PaymentsServer> {
    Router::new()
        .route(paths::payments::PAYMENTS, post(payments::create_payment))
        .route(paths::payments::REFUND, post(payments::create_refund))
        .route(paths::payments::REVIEW, post(payments::review_payment))
}

/// Processor notifications authenticate by signature, not identity headers.
pub fn webhook_routes() -> Router<PaymentsServer> {
    Router::new().route(paths::webhooks::PROCESSOR, post(webhooks::processor_webhook))
}

pub fn create_routes() -> Router<PaymentsServer> {
    Router::new()
        .merge(health_routes())
        .merge(payment_routes())
        .merge(webhook_routes())
}
