use std::str::FromStr;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Create a SQLite connection pool for the given database URL.
///
/// The database file is created on first run. WAL journaling keeps the ticker
/// and HTTP handlers from blocking each other on writes.
///
/// Returns a `sqlx::SqlitePool` or an error if the URL is invalid or the pool
/// cannot be created.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Apply the embedded migrations from the `migrations/` directory.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}

// SQLite has no native uuid, decimal or json columns, so those values live
// in TEXT columns and the row structs decode them through these helpers.

pub(crate) fn uuid_col(value: &str) -> Result<Uuid, anyhow::Error> {
    Uuid::parse_str(value).with_context(|| format!("invalid uuid in column: {value}"))
}

pub(crate) fn decimal_col(value: &str) -> Result<Decimal, anyhow::Error> {
    Decimal::from_str(value).with_context(|| format!("invalid decimal in column: {value}"))
}

pub(crate) fn json_col<T: DeserializeOwned>(value: &str) -> Result<T, anyhow::Error> {
    serde_json::from_str(value).context("invalid json in column")
}

/// In-memory database for tests. A single connection keeps every query on
/// the same in-memory instance.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    run_migrations(&pool).await.expect("failed to run migrations");
    pool
}
