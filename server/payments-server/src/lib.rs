//! Payments Server - HTTP surface of the payments engine
//!
//! Exposes charge, refund and review endpoints to authenticated organization
//! members, and the signed webhook endpoint the processor delivers
//! notifications to.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use server::PaymentsServer;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes and middleware
pub fn create_app(server: PaymentsServer) -> Router {
    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer()),
        )
        .with_state(server)
}
