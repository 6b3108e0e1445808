//! SQLite-backed option storage
//!
//! Persists opaque named values; the segmented ratio snapshot lives under a
//! fixed key. WAL mode keeps concurrent reads cheap while the single writer
//! updates options.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

/// Option key the segmented ratio snapshot is persisted under.
pub const SEGMENTED_RATIO_OPTION_KEY: &str = "SegmentedRatio";

/// Durable key/value option store.
pub struct OptionStore {
    pool: SqlitePool,
}

impl OptionStore {
    /// Open (creating if missing) the option database.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite database file path (e.g., "sqlite:./data/pricing.db")
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5) // Limited for SQLite (single writer)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .context("Failed to connect to option database")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS options (
                 name TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
             )",
        )
        .execute(&pool)
        .await
        .context("Failed to create options table")?;

        Ok(Self { pool })
    }

    /// Fetch an option value; `None` when the key has never been written.
    pub async fn get(&self, name: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM options WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read option")?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Write an option value, replacing any previous one.
    pub async fn set(&self, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO options (name, value, updated_at)
             VALUES (?, ?, strftime('%s', 'now'))
             ON CONFLICT(name) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to write option")?;

        Ok(())
    }
}
