//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbook-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Server errors (in app)                                                │
//! │  └── ApiError         - What API clients see (serialized)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (model number, row, counts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Overbooked Product
// =============================================================================

/// One product line that failed the overbooking check.
///
/// `allowance` is what the booking could have taken: the product's available
/// stock plus whatever the booking being edited already reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OverbookedProduct {
    pub product_id: String,
    pub name: String,
    pub requested: i64,
    pub allowance: i64,
}

fn overbooked_names(products: &[OverbookedProduct]) -> String {
    products
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Product referenced by a booking line does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// One or more booking lines ask for more than can be reserved.
    ///
    /// ## User Workflow
    /// ```text
    /// Submit booking (Tile A ×8, Tile B ×3)
    ///      │
    ///      ▼
    /// Check each line: A allows 5, B allows 10
    ///      │
    ///      ▼
    /// Overbooked { products: [Tile A] }
    ///      │
    ///      ▼
    /// Nothing is written. Client shows every offending name.
    /// ```
    #[error("The following products are overbooked: {}", overbooked_names(.products))]
    Overbooked { products: Vec<OverbookedProduct> },

    /// A stock edit would leave less sellable stock than is already booked.
    #[error(
        "Stock for {model_no} cannot drop below reserved quantity: sellable {sellable}, booked {booked}"
    )]
    StockBelowReserved {
        model_no: String,
        sellable: i64,
        booked: i64,
    },

    /// Category still has products attached.
    #[error("Cannot delete category. {count} products are using this category.")]
    CategoryInUse { count: i64 },

    /// Customer still has bookings.
    #[error("Cannot delete customer. {count} bookings belong to this customer.")]
    CustomerHasBookings { count: i64 },

    /// Product is still referenced by booking lines.
    #[error("Cannot delete product {model_no}. It appears in {count} bookings.")]
    ProductHasBookings { model_no: String, count: i64 },

    /// Caller's role does not allow the operation.
    #[error("Not allowed: {action}")]
    Forbidden { action: String },

    /// CSV header row is unusable.
    #[error("Invalid CSV header: {0}")]
    CsvHeader(String),

    /// A CSV data row failed to parse or validate.
    ///
    /// `row` is 1-based and counts data rows only (the header is row 0).
    #[error("Row {row}: {reason}")]
    Import { row: usize, reason: String },

    /// CSV export failed to serialize.
    #[error("Export failed: {0}")]
    Export(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Forbidden error.
    pub fn forbidden(action: impl Into<String>) -> Self {
        CoreError::Forbidden {
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Numeric value is above its ceiling.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: i64 },

    /// Damaged stock exceeds the physical count.
    #[error("bad_stock + dead_stock ({damaged}) cannot exceed total_stock ({total})")]
    DamagedExceedsTotal { damaged: i64, total: i64 },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
