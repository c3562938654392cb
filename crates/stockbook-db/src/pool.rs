//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Server Startup                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐   ┌──────────────────┐    │
//! │  │            SqlitePool                    │   │  write gate      │    │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │   │  Mutex<()>       │    │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │   │  one writer at   │    │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │   │  a time          │    │
//! │  └─────────────────────────────────────────┘   └──────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Reads run in parallel on any connection.                              │
//! │  Writes take the gate, then read-check-write in one transaction.       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why a Write Gate
//! SQLite allows one writer. A deferred transaction that reads availability
//! and then writes can fail to upgrade its lock when another writer got in
//! first. Taking the gate before `BEGIN` makes every check-then-write
//! sequence see the state it commits against.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::changes::{ChangeFeed, ChangeSubscription, DEFAULT_FEED_CAPACITY};
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::activity::ActivityRepository;
use crate::repository::booking::BookingRepository;
use crate::repository::category::CategoryRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::manufacturer::ManufacturerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::stats::StatsRepository;
use crate::repository::user::UserRepository;
use crate::repository::RepoContext;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/stockbook.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Events buffered per change subscriber.
    /// Default: 256
    pub feed_capacity: usize,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the change feed buffer size.
    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            // Closing the only connection would drop the whole database
            idle_timeout: None,
            run_migrations: true,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone: clones share the pool, the write gate, and the change
/// feed.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().create(&user.id, &input).await?;
/// let booking = db.bookings().create(&user.id, &booking_input).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    ctx: RepoContext,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path?mode=rwc creates the file if missing
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            ctx: RepoContext::new(pool, ChangeFeed::new(config.feed_capacity)),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.ctx.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// `(total, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.ctx.pool).await
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer repository methods: writes through the raw pool bypass the
    /// write gate, the activity log, and the change feed.
    pub fn pool(&self) -> &SqlitePool {
        &self.ctx.pool
    }

    /// The change feed repositories publish to.
    pub fn changes(&self) -> &ChangeFeed {
        &self.ctx.changes
    }

    /// Shorthand for `changes().subscribe()`.
    pub fn subscribe(&self) -> ChangeSubscription {
        self.ctx.changes.subscribe()
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.ctx.clone())
    }

    pub fn manufacturers(&self) -> ManufacturerRepository {
        ManufacturerRepository::new(self.ctx.clone())
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.ctx.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.ctx.clone())
    }

    pub fn bookings(&self) -> BookingRepository {
        BookingRepository::new(self.ctx.clone())
    }

    pub fn activity(&self) -> ActivityRepository {
        ActivityRepository::new(self.ctx.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.ctx.clone())
    }

    pub fn stats(&self) -> StatsRepository {
        StatsRepository::new(self.ctx.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.ctx.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.ctx.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (total, applied) = db.migration_status().await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 2);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let a = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query(
            "INSERT INTO categories (id, name, created_at, updated_at) VALUES ('c1', 'Taps', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .execute(a.pool())
        .await
        .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(b.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .feed_capacity(16);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.feed_capacity, 16);
        assert!(config.idle_timeout.is_some());
        assert!(DbConfig::in_memory().idle_timeout.is_none());
    }

    #[tokio::test]
    async fn test_close_fails_health_check() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }
}
