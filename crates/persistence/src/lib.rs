//! # Aidfund Persistence
//!
//! SQLite storage for requests, the status log, receipts and the fund
//! ledger, plus a JSONL outbox for notifications.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aidfund_persistence::{Database, DatabaseConfig, RequestRepo};
//!
//! let db = Database::connect(&DatabaseConfig::default()).await?;
//! let mut conn = db.pool().acquire().await?;
//! let request = RequestRepo::get_by_id(&mut conn, "REQ-...").await?;
//! ```

pub mod error;
pub mod outbox;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use outbox::{OutboxRecord, OutboxStore};
pub use sqlite::{
    create_schema, BalanceRepo, LedgerFilter, LedgerRepo, ReceiptRepo, RequestFilter,
    RequestRepo, StatusLogRepo,
};

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on SQLite's lock before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_url() -> String {
    "sqlite:aidfund.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Database facade
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and apply the schema.
    pub async fn connect(config: &DatabaseConfig) -> PersistenceResult<Self> {
        if config.is_memory() {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        create_schema(&pool).await?;
        info!(url = %config.url, "Database ready");
        Ok(Self { pool })
    }

    /// Private in-memory database.
    ///
    /// Each SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn in_memory() -> PersistenceResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults_from_json() {
        let config: DatabaseConfig = serde_json::from_str(r#"{"url": "sqlite:x.db"}"#).unwrap();
        assert_eq!(config.url, "sqlite:x.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[tokio::test]
    async fn test_file_database_schema_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("fund.db").display());
        let config = DatabaseConfig::with_url(&url);

        let db = Database::connect(&config).await.unwrap();
        db.close().await;
        // Reopening re-runs the schema without error
        let db = Database::connect(&config).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(LedgerRepo::max_seq(&mut conn).await.unwrap(), 0);
    }
}
