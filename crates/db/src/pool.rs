//! Database connection pool management.

use crate::error::{RepoError, RepoResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// How long to wait for a free connection (also used as SQLite busy timeout).
    pub acquire_timeout: Duration,
    /// Optional limit on a single statement, enforced by the repository.
    pub statement_timeout: Option<Duration>,
    /// Create the database file when it does not exist.
    pub create_if_missing: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Some(Duration::from_secs(30)),
            create_if_missing: false,
        }
    }
}

/// Database connection pool wrapper.
///
/// Cheap to clone; every clone shares the same bounded pool. Connections are
/// returned to the pool when the query future completes or is dropped.
#[derive(Clone)]
pub struct DbPool {
    pool: SqlitePool,
    config: DbConfig,
}

impl DbPool {
    /// Open (creating if needed) a SQLite database with default settings.
    ///
    /// # Arguments
    /// * `db_path` - Path or `sqlite:` URL of the database file
    pub async fn new(db_path: &str) -> RepoResult<Self> {
        let config = DbConfig {
            create_if_missing: true,
            ..DbConfig::default()
        };
        Self::with_config(db_path, config).await
    }

    /// Open a SQLite database with explicit settings.
    ///
    /// Any failure to establish the first connection is reported as
    /// [`RepoError::Connectivity`].
    pub async fn with_config(db_path: &str, config: DbConfig) -> RepoResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)
            .map_err(|e| {
                RepoError::Connectivity(format!("invalid database location `{}`: {}", db_path, e))
            })?
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.acquire_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::Connectivity(format!("cannot open `{}`: {}", db_path, e)))?;

        info!(
            max_connections = config.max_connections,
            "Connected to database at {}", db_path
        );

        Ok(Self { pool, config })
    }

    /// Get a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Create or upgrade the countries/indicators/observations schema.
    pub async fn migrate(&self) -> RepoResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepoError::Schema(format!("migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Close every connection. Later queries fail with a connectivity error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
