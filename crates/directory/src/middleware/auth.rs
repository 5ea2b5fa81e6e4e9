//! Acting-user extractor.
//!
//! Authentication is done by the proxy in front of the directory, which
//! forwards the outcome as headers:
//!
//! - `x-user-id` - numeric id of the authenticated user (required)
//! - `x-user-admin` - `true`/`1` for administrators (optional)
//!
//! Handlers take an [`Actor`] argument and pass it explicitly to ownership
//! checks.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use shopmap_core::UserId;

use crate::models::Actor;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header marking the user as an administrator.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// Error returned when the request carries no usable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRejection {
    /// No `x-user-id` header.
    Missing,
    /// `x-user-id` is not a valid id.
    Invalid,
}

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Missing => "Authentication required",
            Self::Invalid => "Invalid user identity",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: UserId = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(ActorRejection::Missing)?
            .to_str()
            .ok()
            .and_then(|v| v.parse().ok())
            .ok_or(ActorRejection::Invalid)?;

        let is_admin = parts
            .headers
            .get(USER_ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"));

        Ok(Self { user_id, is_admin })
    }
}
