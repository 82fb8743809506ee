pub mod auth_context;
pub mod extractors;

pub use auth_context::AuthContext;
pub use extractors::{ApiJson, ApiPath};

use axum::http::{header, HeaderName, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// CORS policy for browser clients of the payments API
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(auth_context::USER_ID_HEADER),
            HeaderName::from_static(auth_context::ORGANIZATION_ID_HEADER),
            HeaderName::from_static(auth_context::ROLE_HEADER),
            HeaderName::from_static(auth_context::LOCATION_HEADER),
        ])
        .expose_headers([HeaderName::from_static("x-error-id")])
        .max_age(Duration::from_secs(3600))
}

/// Header carrying the processor's webhook signature, lower-cased for lookups.
pub fn signature_header() -> HeaderName {
    HeaderName::from_static("processor-signature")
}
