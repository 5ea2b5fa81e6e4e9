//! HTTP route handlers for the directory service.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                - Liveness check
//! GET    /health/ready          - Readiness check (store reachable)
//!
//! # Search (public)
//! GET    /api/shops/search      - Filtered, paginated shop search
//!
//! # Shop management (x-user-id required)
//! GET    /shops                 - Own shops (all shops for admins)
//! POST   /shops                 - Create a shop
//! GET    /shops/{id}            - Shop detail
//! PUT    /shops/{id}            - Update a shop
//! DELETE /shops/{id}            - Delete a shop
//! ```

pub mod search;
pub mod shops;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::get,
};

use crate::state::AppState;

/// Create the shop management router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shops::index).post(shops::create))
        .route(
            "/{id}",
            get(shops::show).put(shops::update).delete(shops::destroy),
        )
}

/// Create all routes for the directory.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/shops/search", get(search::search))
        .nest("/shops", shop_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
