//! SQLite connection pool and durable-store primitives

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::schema::{self, SCHEMA_VERSION};
use crate::error::Result;

const KEY_SCHEMA_VERSION: &str = "schema_version";

/// Durable store for the whole engine.
///
/// Wraps the SQLite connection pool, owns the schema lifecycle, and exposes
/// the transaction primitive every multi-table write goes through.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at the given path.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// Limited to a single connection: parallel connections to `:memory:`
    /// would each see their own empty database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Create missing tables and apply additive schema upgrades.
    async fn init(&self) -> Result<()> {
        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *tx)
        .await?;

        let stored: Option<(String,)> =
            sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
                .bind(KEY_SCHEMA_VERSION)
                .fetch_optional(&mut *tx)
                .await?;
        let from_version = stored
            .and_then(|(v,)| v.parse::<i64>().ok())
            .unwrap_or(0);

        if from_version < SCHEMA_VERSION {
            schema::upgrade(&mut tx, from_version).await?;
            Self::save_metadata_tx(&mut tx, KEY_SCHEMA_VERSION, &SCHEMA_VERSION.to_string())
                .await?;
            tracing::info!(from_version, to_version = SCHEMA_VERSION, "schema upgraded");
        }

        tx.commit().await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction. Everything executed against it commits together
    /// or not at all; dropping the transaction without committing rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Read a metadata value, falling back to `default` when absent.
    pub async fn read_metadata(&self, key: &str, default: &str) -> Result<String> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v).unwrap_or_else(|| default.to_string()))
    }

    /// Upsert a metadata value.
    pub async fn save_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a metadata value inside an open transaction.
    pub(crate) async fn save_metadata_tx(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        value: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Delete every stored row (translations, annotations, progress,
    /// state) in one transaction. The schema version survives.
    pub async fn wipe_all(&self) -> Result<()> {
        let mut tx = self.begin().await?;
        for table in schema::ALL_TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM metadata WHERE key != ?")
            .bind(KEY_SCHEMA_VERSION)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!("wiped all stored data");
        Ok(())
    }
}
