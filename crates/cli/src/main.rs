//! shopmap CLI - Database migrations and spreadsheet imports.
//!
//! # Usage
//!
//! ```bash
//! # Run directory database migrations
//! shopmap migrate
//!
//! # Import a partner spreadsheet on behalf of user 1
//! shopmap import partners.xlsx --user-id 1
//!
//! # Pick a sheet and tag shops with another source
//! shopmap import partners.ods --user-id 1 --sheet Export --source acme
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `import` - Reconcile a spreadsheet into shops and geocoded pickups

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopmap")]
#[command(author, version, about = "shopmap CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Import shops from a spreadsheet (.xlsx, .xls, .ods)
    Import {
        /// Spreadsheet to read
        file: PathBuf,

        /// User that owns newly created shops
        #[arg(short, long)]
        user_id: i64,

        /// Worksheet name (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Import source tag (defaults to `IMPORT_SOURCE_ID`)
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopmap_cli=info,shopmap_directory=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::directory().await?,
        Commands::Import {
            file,
            user_id,
            sheet,
            source,
        } => {
            commands::import::run(commands::import::ImportArgs {
                file,
                user_id,
                sheet,
                source,
            })
            .await?;
        }
    }
    Ok(())
}
