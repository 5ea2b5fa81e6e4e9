//! Spatial store adapter.
//!
//! # Database: `shopmap` (`PostgreSQL` + `PostGIS`)
//!
//! ## Tables (schema `directory`)
//!
//! - `shops` - Shop records, including the `(source_id, object_id)` import key
//! - `pickups` - At most one pickup point per shop (`geography(Point, 4326)`)
//! - `shippings` - Shipping zones (point, radius, countries)
//! - `shop_shipping` - Many-to-many join between shops and shipping zones
//!
//! # Migrations
//!
//! Migrations are stored in `crates/directory/migrations/` and run via:
//! ```bash
//! cargo run -p shopmap-cli -- migrate
//! ```
//!
//! # Implementations
//!
//! - [`PgShopStore`] - production store, predicates compiled to SQL
//! - [`MemoryShopStore`] - in-process store evaluating the same predicates in Rust

pub mod memory;
pub mod postgres;
pub mod query;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopmap_core::{ExternalKey, ShopId, UserId};

use crate::models::{NewPickup, NewShop, Pickup, ShippingLink, Shop, ShopFields};

pub use memory::MemoryShopStore;
pub use postgres::PgShopStore;
pub use query::{FlagField, Predicate, ShopQuery, TextField};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate import key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Persistence of shops, pickups and shipping zones.
///
/// Implementations must be safe to share between concurrent requests; the
/// store is the only shared state the service has.
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Run a compiled query. Returns one page of shops ordered by id and the
    /// total number of matches across all pages.
    async fn search_shops(&self, query: &ShopQuery) -> Result<(Vec<Shop>, u64), RepositoryError>;

    /// All pickups belonging to any of `shops`.
    async fn pickups_for_shops(&self, shops: &[ShopId]) -> Result<Vec<Pickup>, RepositoryError>;

    /// All shipping zones attached to any of `shops`, one entry per attachment.
    async fn shippings_for_shops(
        &self,
        shops: &[ShopId],
    ) -> Result<Vec<ShippingLink>, RepositoryError>;

    async fn find_shop(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError>;

    /// Shops owned by `owner`, or every shop when `owner` is `None`.
    async fn list_shops(&self, owner: Option<UserId>) -> Result<Vec<Shop>, RepositoryError>;

    async fn find_by_external_key(
        &self,
        key: &ExternalKey,
    ) -> Result<Option<Shop>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the external key is already taken.
    async fn create_shop(&self, shop: &NewShop) -> Result<Shop, RepositoryError>;

    /// Replace a shop's business fields. Identity, owner and import key are kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    async fn update_shop(&self, id: ShopId, fields: &ShopFields) -> Result<Shop, RepositoryError>;

    /// Delete a shop together with its pickups and shipping attachments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    async fn delete_shop(&self, id: ShopId) -> Result<(), RepositoryError>;

    /// Delete every pickup of a shop, returning how many were removed.
    async fn delete_pickups(&self, shop: ShopId) -> Result<u64, RepositoryError>;

    async fn create_pickup(
        &self,
        shop: ShopId,
        pickup: &NewPickup,
    ) -> Result<Pickup, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
