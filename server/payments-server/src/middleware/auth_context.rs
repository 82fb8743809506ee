//! Authentication context extraction
//!
//! Identity is established by the upstream authenticated-identity provider,
//! which forwards it on every request as headers:
//!
//! | Header | Content |
//! |---|---|
//! | `x-user-id` | user UUID |
//! | `x-organization-id` | organization UUID |
//! | `x-user-role` | `owner`, `admin`, `member` or `viewer` |
//! | `x-client-location` | optional coarse location, e.g. a country code |

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use payments_service::{Actor, Role};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ORGANIZATION_ID_HEADER: &str = "x-organization-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const LOCATION_HEADER: &str = "x-client-location";

/// Authenticated actor for the current request
#[derive(Debug, Clone)]
pub struct AuthContext(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
    let raw = header(headers, name).ok_or_else(|| ApiError::unauthenticated(format!("Missing {name} header")))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::unauthenticated(format!("Invalid {name} header")))
}

/// Builds the actor from identity headers.
///
/// # Errors
///
/// [`ApiError::Unauthenticated`] when a required header is missing or malformed.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = uuid_header(headers, USER_ID_HEADER)?;
    let organization_id = uuid_header(headers, ORGANIZATION_ID_HEADER)?;
    let role = header(headers, ROLE_HEADER)
        .ok_or_else(|| ApiError::unauthenticated(format!("Missing {ROLE_HEADER} header")))?
        .parse::<Role>()
        .map_err(|()| ApiError::unauthenticated(format!("Invalid {ROLE_HEADER} header")))?;

    Ok(Actor {
        user_id,
        organization_id,
        role,
        location: header(headers, LOCATION_HEADER).map(str::to_uppercase),
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(AuthContext)
    }
}
