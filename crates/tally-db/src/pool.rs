//! # Connection Pool
//!
//! One [`Database`] per process. It owns the SQLite pool and hands out
//! repositories that share it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  main()                                                                 │
//! │    │  DbConfig::new(DATABASE_PATH).max_connections(DB_MAX_CONNECTIONS)  │
//! │    ▼                                                                    │
//! │  Database::new ──► open/create file ──► PRAGMAs ──► embedded migrations │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  AppState.db ──► handlers ──► db.sales().begin_checkout(..)             │
//! │                            ──► db.activities().insert(..)  (detached)   │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  shutdown ──► db.close()                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! PRAGMAs on every connection: `journal_mode=WAL`, `synchronous=NORMAL`,
//! `foreign_keys=ON` (sale lines and payments cascade with their sale) and
//! a busy timeout. Checkout and payment transactions open with
//! `BEGIN IMMEDIATE`, so concurrent ones wait up to that timeout for the
//! write lock instead of failing on upgrade.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::activity::ActivityRepository;
use crate::repository::dashboard::DashboardRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::user::UserRepository;

const MEMORY: &str = ":memory:";

/// Pool settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    /// How long a writer waits on SQLite's lock before `SQLITE_BUSY`.
    pub busy_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Private in-memory database for tests.
    ///
    /// The database lives in a single connection, so a query issued while a
    /// transaction is open must run on that transaction or it will wait for
    /// the connection until `acquire_timeout`.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY)
        }
    }

    fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

/// Shared handle to the store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            // An in-memory database disappears with its last connection
            .idle_timeout(if config.is_memory() {
                None
            } else {
                Some(Duration::from_secs(600))
            })
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;

        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Database ready"
        );
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn activities(&self) -> ActivityRepository {
        ActivityRepository::new(self.pool.clone())
    }

    pub fn dashboard(&self) -> DashboardRepository {
        DashboardRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }

    /// True when a trivial query round-trips. Backs `GET /health`.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// `(embedded, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }
}
