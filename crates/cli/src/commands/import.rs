//! Spreadsheet import command.
//!
//! # Usage
//!
//! ```bash
//! shopmap import partners.xlsx --user-id 1 [--sheet <name>] [--source <id>]
//! ```
//!
//! # Environment Variables
//!
//! - `DIRECTORY_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `GOOGLE_MAPS_GEOCODING_API_KEY` - Google Maps web services key
//! - `GEOCODER_TIMEOUT_SECS` - Per-call geocoding timeout (default 10)
//! - `IMPORT_SOURCE_ID` - Source tag for imported shops (default `salamantex`)

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use shopmap_core::UserId;
use shopmap_directory::config::{ConfigError, DirectoryConfig, GeocodingConfig, ImportConfig};
use shopmap_directory::db::{self, PgShopStore};
use shopmap_directory::geocoding::{GeocodingError, GoogleMapsClient, LocationResolver};
use shopmap_directory::import::Importer;

use super::spreadsheet::{self, SpreadsheetError};

/// Arguments of `shopmap import`.
#[derive(Debug)]
pub struct ImportArgs {
    pub file: PathBuf,
    pub user_id: i64,
    pub sheet: Option<String>,
    pub source: Option<String>,
}

/// Errors that abort an import before any row is processed.
#[derive(Debug, Error)]
pub enum ImportCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Geocoding client error: {0}")]
    Geocoding(#[from] GeocodingError),

    #[error("Spreadsheet reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Run an import. Row failures are reported, not returned.
///
/// # Errors
///
/// Returns an error if configuration is missing, the spreadsheet cannot be
/// read or the database is unreachable.
pub async fn run(args: ImportArgs) -> Result<(), ImportCommandError> {
    let directory = DirectoryConfig::from_env()?;
    let geocoding = GeocodingConfig::from_env()?;
    let source_id = args
        .source
        .unwrap_or_else(|| ImportConfig::from_env().source_id);

    info!(file = %args.file.display(), "Reading spreadsheet");
    let file = args.file.clone();
    let sheet = args.sheet.clone();
    let rows =
        tokio::task::spawn_blocking(move || spreadsheet::read_rows(&file, sheet.as_deref()))
            .await??;
    info!(rows = rows.len(), "Spreadsheet parsed");

    let pool = db::create_pool(&directory.database_url).await?;
    let store = Arc::new(PgShopStore::new(pool));

    let google = Arc::new(GoogleMapsClient::new(&geocoding)?);
    let resolver = LocationResolver::new(google.clone(), google, geocoding.timeout);
    let importer = Importer::new(store, Arc::new(resolver), source_id);

    let report = importer
        .import_batch(&rows, UserId::new(args.user_id))
        .await;

    for failure in &report.failures {
        warn!(
            row = failure.row,
            partner_number = failure.partner_number.as_deref().unwrap_or("-"),
            "{}",
            failure.message
        );
    }

    info!(
        source_id = importer.source_id(),
        total = report.total(),
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        located = report.located(),
        "Import complete"
    );
    Ok(())
}
