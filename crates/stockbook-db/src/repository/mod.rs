//! # Repository Module
//!
//! Database repository implementations for Stockbook.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Every Mutation                                       │
//! │                                                                         │
//! │  validate input (stockbook-core)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ctx.write_lock()  ← one writer at a time                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │  ├── read current state (before snapshot, availability)                │
//! │  ├── business check (overbooking, delete blocked, ...)                 │
//! │  │      └── Err → transaction dropped → ROLLBACK                      │
//! │  ├── INSERT / UPDATE / DELETE                                          │
//! │  └── INSERT INTO activity_logs                                         │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ctx.publish(...)  ← change feed, after commit only                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, search, CSV import
//! - [`manufacturer::ManufacturerRepository`] - Suppliers and their overview
//! - [`category::CategoryRepository`] - Product categories
//! - [`customer::CustomerRepository`] - Customers
//! - [`booking::BookingRepository`] - Bookings with the overbooking check
//! - [`activity::ActivityRepository`] - Audit feed
//! - [`user::UserRepository`] - Dashboard accounts
//! - [`stats::StatsRepository`] - Dashboard totals

pub mod activity;
pub mod booking;
pub mod category;
pub mod customer;
pub mod manufacturer;
pub mod product;
pub mod stats;
pub mod user;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sqlx::{Sqlite, SqlitePool, Transaction};
use stockbook_core::{ActionType, EntityType};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::changes::{ChangeEvent, ChangeFeed};
use crate::error::{DbError, DbResult};

// =============================================================================
// Shared Context
// =============================================================================

/// What every repository holds: the pool, the write gate, the change feed.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub(crate) pool: SqlitePool,
    pub(crate) changes: ChangeFeed,
    writes: Arc<Mutex<()>>,
}

impl RepoContext {
    pub(crate) fn new(pool: SqlitePool, changes: ChangeFeed) -> Self {
        RepoContext {
            pool,
            changes,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Takes the write gate and opens a transaction.
    ///
    /// Hold the guard until after commit.
    pub(crate) async fn begin_write(
        &self,
    ) -> DbResult<(MutexGuard<'_, ()>, Transaction<'static, Sqlite>)> {
        let guard = self.writes.lock().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok((guard, tx))
    }

    pub(crate) fn publish(&self, entity: EntityType, action: ActionType, id: Option<&str>) {
        self.changes
            .publish(ChangeEvent::new(entity, action, id.map(str::to_string)));
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) async fn commit(tx: Transaction<'static, Sqlite>) -> DbResult<()> {
    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// JSON snapshot of a record for activity metadata.
pub(crate) fn snapshot<T: Serialize>(value: &T) -> DbResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// `?, ?, ?` for an `IN (...)` list of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Pattern for `LIKE ? ESCAPE '\'` matching `term` anywhere.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Empty or whitespace-only strings become `None`.
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("tap"), "%tap%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some("  ".to_string())), None);
        assert_eq!(non_blank(&Some(" Matt ".to_string())), Some("Matt".to_string()));
        assert_eq!(non_blank(&None), None);
    }
}
