//! Shopmap directory service library.
//!
//! Geospatial shop search over HTTP plus the batch import pipeline that
//! reconciles spreadsheet rows into shops and geocodes their pickup points.
//! The binary in `main.rs` wires these together; the CLI reuses the import
//! side directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod geocoding;
pub mod import;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with its per-request middleware.
///
/// Sentry layers are added by the binary, outermost, after this.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
