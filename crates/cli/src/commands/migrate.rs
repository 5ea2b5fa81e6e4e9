//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! shopmap migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DIRECTORY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Directory migrations: `crates/directory/migrations/`

use thiserror::Error;

use shopmap_directory::config::{ConfigError, DirectoryConfig};
use shopmap_directory::db;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run directory database migrations.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is unreachable
/// or a migration fails.
pub async fn directory() -> Result<(), MigrationError> {
    let config = DirectoryConfig::from_env()?;

    tracing::info!("Connecting to directory database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running directory migrations...");
    sqlx::migrate!("../directory/migrations").run(&pool).await?;

    tracing::info!("Directory migrations complete!");
    Ok(())
}
