//! shopmap core - shared domain types.
//!
//! This crate provides the types shared by every shopmap component:
//! - `directory` - HTTP search service and import pipeline
//! - `cli` - Command-line tools for migrations and spreadsheet imports
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything spatial the service reasons about
//! (points, boxes, great-circle distances) lives here so the in-memory store
//! and the SQL store agree on a single definition.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, geo primitives and reconciliation keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
