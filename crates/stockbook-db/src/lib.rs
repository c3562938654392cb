//! # stockbook-db: Database Layer for Stockbook
//!
//! This crate provides database access for Stockbook.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /api/bookings)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockbook-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │◄───│ BookingRepo   │    │ 002_users... │  │   │
//! │  │   │ write gate    │    │ ActivityRepo  │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │           ▼                                                     │   │
//! │  │   ChangeFeed ──► subscribers (WebSocket clients)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`changes`] - Per-table change notifications
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockbook.db")).await?;
//!
//! let hits = db.products().search("basin", 5).await?;
//! let booking = db.bookings().create(&user_id, &input).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod changes;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use changes::{ChangeEvent, ChangeFeed, ChangeSubscription};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::activity::ActivityRepository;
pub use repository::booking::BookingRepository;
pub use repository::category::CategoryRepository;
pub use repository::customer::CustomerRepository;
pub use repository::manufacturer::ManufacturerRepository;
pub use repository::product::{ImportSummary, ProductRepository};
pub use repository::stats::StatsRepository;
pub use repository::user::{UserCredentials, UserRepository};
