//! Database connection management
//!
//! SQLite pool plus the helpers every repository uses to move decimals and
//! timestamps in and out of rows. A unit of work is a plain sqlx transaction:
//! `begin()`, pass `&mut *tx` to the repositories, `commit()`. Dropping the
//! transaction without committing rolls it back.

pub mod schema;

use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::LedgerError;

/// A unit of work against the ledger store
pub type UnitOfWork<'a> = Transaction<'a, Sqlite>;

/// SQLite database connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database and bootstrap the schema
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!(url = %config.url, "SQLite ledger store opened");
        Ok(db)
    }

    /// Private in-memory database. One connection, so every handle sees the
    /// same data; never hold a unit of work while calling through the pool.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Create tables and indexes that do not exist yet
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a unit of work
    pub async fn begin(&self) -> Result<UnitOfWork<'static>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Flush and close all connections
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite ledger store closed");
    }
}

/// Decimals are stored as canonical TEXT; SQLite has no exact numeric type.
pub(crate) fn decimal_to_sql(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, LedgerError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .map_err(|e| LedgerError::CorruptRow(format!("column '{}' = '{}': {}", column, raw, e)))
}
