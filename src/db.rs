//! Database connection management

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;

/// Idempotent DDL, one statement per entry. Decimals are stored as TEXT to
/// keep them exact; timestamps are chrono UTC values.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS economies (
        economy_id      INTEGER PRIMARY KEY,
        name            TEXT NOT NULL,
        currency_name   TEXT NOT NULL,
        currency_symbol TEXT NOT NULL,
        exchange_rate   TEXT NOT NULL,
        status          TEXT NOT NULL,
        applied_at      TEXT NOT NULL,
        decided_at      TEXT,
        officer_id      INTEGER,
        note            TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_economies_status ON economies(status)",
    "CREATE TABLE IF NOT EXISTS officers (
        user_id    INTEGER PRIMARY KEY,
        granted_by INTEGER NOT NULL,
        granted_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transfers (
        transfer_id       TEXT PRIMARY KEY,
        source_economy_id INTEGER NOT NULL,
        target_economy_id INTEGER NOT NULL,
        user_id           INTEGER NOT NULL,
        wallet            TEXT NOT NULL,
        source_amount     TEXT NOT NULL,
        target_amount     TEXT NOT NULL,
        source_rate       TEXT NOT NULL,
        target_rate       TEXT NOT NULL,
        status            TEXT NOT NULL,
        detail            TEXT,
        created_at        TEXT NOT NULL,
        completed_at      TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_transfers_status ON transfers(status)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_created ON transfers(created_at)",
    "CREATE TABLE IF NOT EXISTS audit_log (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        actor_id   INTEGER NOT NULL,
        action     TEXT NOT NULL,
        target     TEXT NOT NULL,
        detail     TEXT,
        created_at TEXT NOT NULL
    )",
];

/// SQLite database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("SQLite connection pool established");
        Ok(Self { pool })
    }

    /// Ephemeral in-memory database.
    ///
    /// A single connection that never idles out: each SQLite `:memory:`
    /// connection is its own database, so pooling more than one would split
    /// the data.
    pub async fn connect_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// Create all tables and indexes if they do not exist yet
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        tracing::info!("Database schema initialized");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
