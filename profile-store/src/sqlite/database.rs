//! SQLite database connection pool and base schema runner.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool};
use std::str::FromStr;

use crate::config::StoreConfig;
use crate::traits::ConnectionProvider;
use crate::StoreError;

/// Holds a connection pool to the SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `config.database_path`, apply the
    /// base schema, and return a ready-to-use `Database`.
    ///
    /// The legacy schema migration is not run here; see
    /// [`open_stores`](super::open_stores).
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = &config.database_path;
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "Opened profile database");

        let db = Self { pool };
        db.apply_base_schema().await?;
        Ok(db)
    }

    /// Create an in-memory database for testing. The base schema is applied.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        Self::new_in_memory_with("").await
    }

    /// Create an in-memory database, run `setup_sql` on it, then apply the
    /// base schema. Used to build legacy fixtures.
    #[cfg(test)]
    pub async fn new_in_memory_with(setup_sql: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .journal_mode(SqliteJournalMode::Wal);

        // One connection: every connection to `:memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        if !setup_sql.is_empty() {
            sqlx::raw_sql(setup_sql).execute(&pool).await?;
        }

        let db = Self { pool };
        db.apply_base_schema().await?;
        Ok(db)
    }

    /// Run embedded migrations from `profile-store/migrations/`.
    async fn apply_base_schema(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ConnectionProvider for Database {
    async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        Ok(self.pool.acquire().await?)
    }
}
