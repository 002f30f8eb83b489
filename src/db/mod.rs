pub mod drug_products;
pub mod sqlite;

pub use drug_products::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Seed data parse failed: {0}")]
    SeedParse(String),

    #[error("Cannot create database directory {0}: {1}")]
    Directory(String, String),
}
