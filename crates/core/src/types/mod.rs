//! Core types for shopmap.
//!
//! This module provides type-safe wrappers for the directory's domain concepts.

pub mod email;
pub mod external;
pub mod geo;
pub mod id;

pub use email::{Email, EmailError};
pub use external::ExternalKey;
pub use geo::{BoundingBox, GeoError, GeoPoint, Radius};
pub use id::*;
