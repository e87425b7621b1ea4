//! SQLite connection management.
//!
//! WAL mode lets the read-only query paths run while a single ingestion
//! writer commits batches. Foreign keys are enforced on every connection,
//! which is what keeps `products.department_id` from ever dangling.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::error::CatalogResult;

/// Create a connection pool to the configured SQLite database.
///
/// Creates the database file and its parent directories if missing.
pub async fn connect(config: &Config) -> CatalogResult<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
