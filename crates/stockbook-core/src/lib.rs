//! # stockbook-core: Pure Business Logic for Stockbook
//!
//! This crate is the **heart** of Stockbook. It contains the inventory and
//! booking rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Dashboard (browser)                          │   │
//! │  │   Products ──► Bookings ──► Customers ──► Activity feed          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP, WebSocket events       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    stockbook-server (axum)                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐           │   │
//! │  │   │  types  │ │  stock   │ │  access  │ │ transfer │           │   │
//! │  │   │ Product │ │ available│ │  roles   │ │ CSV in/  │           │   │
//! │  │   │ Booking │ │ overbook │ │ columns  │ │   out    │           │   │
//! │  │   └─────────┘ └──────────┘ └──────────┘ └──────────┘           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockbook-db (Database Layer)                   │   │
//! │  │          SQLite queries, migrations, repositories               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records and client inputs
//! - [`stock`] - Available stock formula and the overbooking check
//! - [`validation`] - Field rules for every input
//! - [`access`] - Role capabilities and visible columns
//! - [`columns`] - Product column names, labels, projection
//! - [`transfer`] - CSV import/export
//! - [`activity`] - Audit entries and field diffs
//! - [`report`] - Dashboard totals, list filters, groupings
//! - [`money`] - Integer money for booking amounts
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbook_core::stock::StockLevels;
//!
//! // 120 on hand, 4 broken, 6 obsolete, 30 reserved
//! let levels = StockLevels::new(120, 4, 6, 30);
//! assert_eq!(levels.available(), 80);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod activity;
pub mod columns;
pub mod error;
pub mod money;
pub mod report;
pub mod stock;
pub mod transfer;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::Principal;
pub use activity::{ActionType, ActivityEntry, EntityType};
pub use columns::{CatalogNames, ProductColumn};
pub use error::{CoreError, CoreResult, OverbookedProduct, ValidationError};
pub use money::Money;
pub use stock::{StockLevels, StockStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of entries the activity feed shows.
pub const ACTIVITY_FEED_LIMIT: u32 = 50;

/// Product suggestions offered while filling a booking line.
pub const BOOKING_SEARCH_LIMIT: u32 = 5;
