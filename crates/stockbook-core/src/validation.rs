//! # Validation Module
//!
//! Input validation for everything a client can submit.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler                                                 │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules (required, length, sign, format)                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: stock module / repositories                                  │
//! │  └── Rules that need current data (overbooking, in-use checks)         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── NOT NULL, UNIQUE, CHECK, FOREIGN KEY constraints                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{
    BookingInput, CategoryInput, CustomerInput, ManufacturerInput, ProductInput,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_MODEL_NO_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SEARCH_LEN: usize = 100;

/// Ceiling for a single booking line.
pub const MAX_QUANTITY: i64 = 1_000_000;
/// Ceiling for each product stock count.
pub const MAX_STOCK: i64 = 1_000_000_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product model number.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, `-`, `_`, `/`, `.` and spaces only
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_model_no;
///
/// assert!(validate_model_no("GT-6060/PL").is_ok());
/// assert!(validate_model_no("").is_err());
/// assert!(validate_model_no("bad;drop").is_err());
/// ```
pub fn validate_model_no(model_no: &str) -> ValidationResult<()> {
    let model_no = model_no.trim();

    if model_no.is_empty() {
        return Err(ValidationError::Required {
            field: "model_no".to_string(),
        });
    }

    if model_no.chars().count() > MAX_MODEL_NO_LEN {
        return Err(ValidationError::TooLong {
            field: "model_no".to_string(),
            max: MAX_MODEL_NO_LEN,
        });
    }

    if !model_no
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.' | ' '))
    {
        return Err(ValidationError::InvalidFormat {
            field: "model_no".to_string(),
            reason: "must contain only letters, numbers, spaces, and - _ / .".to_string(),
        });
    }

    Ok(())
}

/// Validates a required display name.
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an optional email address.
///
/// Only the shape is checked: one `@` with something on both sides and a
/// dot somewhere in the domain.
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }

    Ok(())
}

/// Normalizes and validates a search query.
///
/// ## Returns
/// The trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<&str> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    Ok(query)
}

/// Validates a UUID string.
pub fn validate_uuid(field: &str, value: &str) -> ValidationResult<()> {
    uuid::Uuid::parse_str(value).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a booking line quantity: `1..=MAX_QUANTITY`.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_QUANTITY {
        return Err(ValidationError::TooLarge {
            field: "quantity".to_string(),
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a booking amount in minor units.
pub fn validate_amount_cents(amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::Negative {
            field: "total_amount".to_string(),
        });
    }
    Ok(())
}

/// Validates stored stock counts.
///
/// ## Rules
/// - No count may be negative or above `MAX_STOCK`
/// - Damaged units (`bad + dead`) cannot exceed `total`
pub fn validate_stock_counts(total: i64, bad: i64, dead: i64) -> ValidationResult<()> {
    for (field, value) in [("total_stock", total), ("bad_stock", bad), ("dead_stock", dead)] {
        if value < 0 {
            return Err(ValidationError::Negative {
                field: field.to_string(),
            });
        }
        if value > MAX_STOCK {
            return Err(ValidationError::TooLarge {
                field: field.to_string(),
                max: MAX_STOCK,
            });
        }
    }

    // Both are at most MAX_STOCK here, so the sum fits
    let damaged = bad + dead;
    if damaged > total {
        return Err(ValidationError::DamagedExceedsTotal { damaged, total });
    }

    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

pub fn validate_product_input(input: &ProductInput) -> ValidationResult<()> {
    validate_model_no(&input.model_no)?;
    validate_name("name", &input.name, MAX_NAME_LEN)?;
    validate_stock_counts(input.total_stock, input.bad_stock, input.dead_stock)?;

    if let Some(id) = input.manufacturer_id.as_deref() {
        validate_uuid("manufacturer_id", id)?;
    }
    if let Some(id) = input.category_id.as_deref() {
        validate_uuid("category_id", id)?;
    }

    Ok(())
}

pub fn validate_manufacturer_input(input: &ManufacturerInput) -> ValidationResult<()> {
    validate_name("factory_name", &input.factory_name, MAX_NAME_LEN)
}

pub fn validate_category_input(input: &CategoryInput) -> ValidationResult<()> {
    validate_name("name", &input.name, 100)
}

pub fn validate_customer_input(input: &CustomerInput) -> ValidationResult<()> {
    validate_name("name", &input.name, MAX_NAME_LEN)?;
    validate_email(input.email.as_deref())
}

/// Validates a booking before any stock is consulted.
///
/// ## Rules
/// - `customer_id` is a UUID
/// - At least one line
/// - Every line references a UUID and has a positive quantity
/// - Amount is not negative
pub fn validate_booking_input(input: &BookingInput) -> ValidationResult<()> {
    validate_uuid("customer_id", &input.customer_id)?;

    if input.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for item in &input.items {
        validate_uuid("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
    }

    validate_amount_cents(input.total_amount_cents)
}

// =============================================================================
// Unit Tests
// =============================================================================
