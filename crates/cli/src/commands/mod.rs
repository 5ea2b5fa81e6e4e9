//! CLI subcommands.

pub mod import;
pub mod migrate;
pub mod spreadsheet;
