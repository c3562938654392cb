//! # Domain Types
//!
//! Core domain types used throughout Stockbook.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌────────────────┐      ┌─────────────────┐      ┌────────────────┐   │
//! │  │  Manufacturer  │◄─────│     Product     │─────►│    Category    │   │
//! │  │  factory_name  │  0..1│  model_no (biz) │0..1  │  name          │   │
//! │  └────────────────┘      │  total/bad/dead │      └────────────────┘   │
//! │                          │  booked (derived)│                          │
//! │                          │  available (der.)│                          │
//! │                          └────────▲────────┘                           │
//! │                                   │ product_id                          │
//! │  ┌────────────────┐      ┌────────┴────────┐                           │
//! │  │    Customer    │◄─────│     Booking     │ 1..n BookingItem          │
//! │  │  name, email   │      │  status, amount │                           │
//! │  └────────────────┘      └─────────────────┘                           │
//! │                                                                         │
//! │  UserProfile (role, access_level, assigned_columns)                    │
//! │  ActivityLog (who did what to which record)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Records vs Inputs
//! Records (`Product`, `Booking`, ...) are what the backend returns. Inputs
//! (`ProductInput`, `BookingInput`, ...) are what clients send: they never
//! carry ids, timestamps, or derived stock figures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::activity::{ActionType, EntityType};
use crate::columns::ProductColumn;
use crate::money::Money;
use crate::stock::{StockLevels, StockStatus};

// =============================================================================
// Manufacturer
// =============================================================================

/// A factory or supplier that products come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Manufacturer {
    pub id: String,
    pub factory_name: String,
    pub contact_person: Option<String>,
    pub contact_info: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManufacturerInput {
    pub factory_name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
///
/// `booked_stock` and `available_stock` are computed by the backend on every
/// read. They are never stored and never accepted from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Model number - business identifier, unique across the catalog.
    pub model_no: String,

    pub name: String,
    pub description: Option<String>,
    pub size: Option<String>,
    pub finish: Option<String>,
    pub manufacturer_id: Option<String>,
    pub category_id: Option<String>,

    /// Notes visible to every role.
    pub remarks: Option<String>,

    /// Notes for admins and managers only.
    pub internal_notes: Option<String>,

    /// Physical units on hand.
    pub total_stock: i64,

    /// Damaged units.
    pub bad_stock: i64,

    /// Unsellable units (discontinued, obsolete).
    pub dead_stock: i64,

    /// Units reserved by non-cancelled bookings (derived).
    pub booked_stock: i64,

    /// `total - bad - dead - booked` (derived).
    pub available_stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Stock figures for this product.
    #[inline]
    pub fn levels(&self) -> StockLevels {
        StockLevels::new(
            self.total_stock,
            self.bad_stock,
            self.dead_stock,
            self.booked_stock,
        )
    }

    /// In/low/out classification of the available stock.
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::classify(self.available_stock)
    }
}

/// Client-supplied product fields for create and full update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub model_no: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub finish: Option<String>,
    #[serde(default)]
    pub manufacturer_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub total_stock: i64,
    #[serde(default)]
    pub bad_stock: i64,
    #[serde(default)]
    pub dead_stock: i64,
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

// =============================================================================
// Booking Status
// =============================================================================

/// Payment progress of a booking.
///
/// Every status except `Cancelled` holds a stock reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Reserved, nothing paid yet.
    #[default]
    Pending,
    /// Part payment received.
    AdvancePaid,
    /// Paid in full.
    FullPaid,
    /// Called off. Releases its reservation.
    Cancelled,
}

impl BookingStatus {
    /// Whether items of a booking in this status count as booked stock.
    #[inline]
    pub const fn reserves_stock(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::AdvancePaid => "advance_paid",
            BookingStatus::FullPaid => "full_paid",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A customer's reservation of one or more products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub status: BookingStatus,
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub booking_date: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<BookingItem>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// One product line of a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BookingItem {
    pub id: String,
    pub booking_id: String,
    pub product_id: String,
    pub model_no: String,
    pub product_name: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingItemInput {
    pub product_id: String,
    pub quantity: i64,
}

/// Client-supplied booking for create and edit.
///
/// On edit, `items` replaces the booking's lines wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingInput {
    pub customer_id: String,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub total_amount_cents: i64,
    /// Defaults to today when omitted.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub booking_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<BookingItemInput>,
}

// =============================================================================
// Users
// =============================================================================

/// Dashboard role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Viewer,
}

/// Write permission for bookings and customers held by a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Read,
    #[serde(alias = "read-write")]
    Write,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub access_level: AccessLevel,
    /// Product columns a viewer may see. Ignored for admins and managers.
    pub assigned_columns: Vec<ProductColumn>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub assigned_columns: Vec<ProductColumn>,
}

/// Partial user update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub access_level: Option<AccessLevel>,
    #[serde(default)]
    pub assigned_columns: Option<Vec<ProductColumn>>,
    #[serde(default)]
    pub password: Option<String>,
}

// =============================================================================
// Activity Log
// =============================================================================

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ActivityLog {
    pub id: String,
    /// `None` once the acting user has been deleted.
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub action_type: ActionType,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub description: String,
    #[ts(type = "unknown")]
    pub metadata: serde_json::Value,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_serde() {
        let json = serde_json::to_string(&BookingStatus::AdvancePaid).unwrap();
        assert_eq!(json, "\"advance_paid\"");
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
        assert!(BookingStatus::FullPaid.reserves_stock());
        assert!(!BookingStatus::Cancelled.reserves_stock());
    }

    #[test]
    fn test_access_level_accepts_legacy_spelling() {
        let level: AccessLevel = serde_json::from_str("\"read-write\"").unwrap();
        assert_eq!(level, AccessLevel::Write);
        let level: AccessLevel = serde_json::from_str("\"read\"").unwrap();
        assert_eq!(level, AccessLevel::Read);
    }

    #[test]
    fn test_product_input_defaults_stock_to_zero() {
        let input: ProductInput =
            serde_json::from_str(r#"{"model_no":"MX-1","name":"Basin"}"#).unwrap();
        assert_eq!(input.total_stock, 0);
        assert_eq!(input.bad_stock, 0);
        assert!(input.manufacturer_id.is_none());
    }
}
