//! HTTP middleware stack for the directory service.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! The acting user for shop management routes is not middleware: handlers
//! take an [`Actor`](crate::models::Actor) extractor from [`auth`].

pub mod auth;
pub mod request_id;

pub use auth::ActorRejection;
pub use request_id::request_id_middleware;
