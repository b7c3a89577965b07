//! SQLite persistence for templates and render jobs.
//!
//! Repositories are zero-sized structs whose async methods take the pool as
//! the first argument. JSON blob columns (`layers`, `variables`, `metadata`)
//! are TEXT in the schema and decoded into typed domain structs here — serde
//! never leaks past this crate.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod error;
pub mod models;
pub mod repositories;

pub use error::DbError;

pub type DbPool = sqlx::SqlitePool;

/// Embedded schema migrations, applied at startup and in tests.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Create a connection pool from a database URL (e.g.
/// `sqlite:reelsmith.db?mode=rwc` or `sqlite::memory:`).
///
/// SQLite allows a single writer; one pooled connection sidesteps
/// database-locked errors and gives `sqlite::memory:` tests a single shared
/// database.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}
