//! # Stock Module
//!
//! The one place where available stock is computed and where booking lines
//! are checked against it.
//!
//! ## The Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  available = total − bad − dead − booked                               │
//! │              └──── sellable ────┘                                      │
//! │                                                                         │
//! │  booked = Σ quantity of items on bookings whose status is not          │
//! │           Cancelled (summed by the database layer)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Overbooking Check
//! ```text
//! requested lines ──► merge duplicates per product
//!                          │
//!                          ▼
//!        allowance(p) = available(p) + already_reserved_by_this_booking(p)
//!                          │
//!                          ▼
//!        any merged qty > allowance?  ──yes──► Overbooked { every offender }
//!                          │
//!                          no
//!                          ▼
//!                        Ok(())
//! ```
//!
//! The check never clamps a quantity and never drops a line: it either
//! accepts the whole request or rejects it naming every offending product.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, OverbookedProduct};
use crate::types::{BookingItem, BookingItemInput, Product};

/// Available stock at or below this is "low".
pub const LOW_STOCK_THRESHOLD: i64 = 10;

// =============================================================================
// Stock Levels
// =============================================================================

/// The four stored/derived counts that determine availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockLevels {
    pub total: i64,
    pub bad: i64,
    pub dead: i64,
    pub booked: i64,
}

impl StockLevels {
    #[inline]
    pub const fn new(total: i64, bad: i64, dead: i64, booked: i64) -> Self {
        StockLevels {
            total,
            bad,
            dead,
            booked,
        }
    }

    /// Units that could be sold if nothing were booked.
    #[inline]
    pub const fn sellable(&self) -> i64 {
        self.total - self.bad - self.dead
    }

    /// Units that can still be booked.
    ///
    /// Not clamped: a negative value means existing reservations exceed
    /// what is sellable.
    #[inline]
    pub const fn available(&self) -> i64 {
        self.sellable() - self.booked
    }
}

// =============================================================================
// Stock Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// `≤ 0` is out of stock, `≤ LOW_STOCK_THRESHOLD` is low.
    pub const fn classify(available: i64) -> Self {
        if available <= 0 {
            StockStatus::OutOfStock
        } else if available <= LOW_STOCK_THRESHOLD {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

// =============================================================================
// Overbooking
// =============================================================================

/// Sums quantities per product, keeping first-seen order.
///
/// Sums saturate at `i64::MAX`, which no product can cover.
pub fn merge_lines(requested: &[BookingItemInput]) -> Vec<(String, i64)> {
    let mut merged: Vec<(String, i64)> = Vec::with_capacity(requested.len());
    for line in requested {
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
            None => merged.push((line.product_id.clone(), line.quantity)),
        }
    }
    merged
}

/// Quantity per product held by an existing booking's items.
///
/// Pass the result as `prior` when editing so the booking's own reservation
/// is not counted against it. Only meaningful for a booking whose status
/// reserves stock; callers pass an empty map otherwise.
pub fn reserved_by_product(items: &[BookingItem]) -> HashMap<String, i64> {
    let mut reserved: HashMap<String, i64> = HashMap::new();
    for item in items {
        let held = reserved.entry(item.product_id.clone()).or_insert(0);
        *held = held.saturating_add(item.quantity);
    }
    reserved
}

/// Checks requested booking lines against current availability.
///
/// ## Arguments
/// * `requested` - Lines as submitted (duplicates allowed)
/// * `products` - Current state of every product referenced by `requested`
/// * `prior` - Reservation already held by the booking being edited
///
/// ## Returns
/// * `Ok(())` - Every merged line fits its allowance
/// * `Err(ProductNotFound)` - A line references a product not in `products`
/// * `Err(Overbooked)` - One entry per offending product, in request order
pub fn check_overbooking(
    requested: &[BookingItemInput],
    products: &[Product],
    prior: &HashMap<String, i64>,
) -> CoreResult<()> {
    let mut offenders = Vec::new();

    for (product_id, quantity) in merge_lines(requested) {
        let product = products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

        let allowance = product
            .available_stock
            .saturating_add(prior.get(&product_id).copied().unwrap_or(0));

        if quantity > allowance {
            offenders.push(OverbookedProduct {
                product_id,
                name: product.name.clone(),
                requested: quantity,
                allowance,
            });
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Overbooked {
            products: offenders,
        })
    }
}

/// Rejects a stock edit that would leave reservations uncovered.
pub fn check_stock_adjustment(model_no: &str, levels: StockLevels) -> CoreResult<()> {
    if levels.available() < 0 {
        return Err(CoreError::StockBelowReserved {
            model_no: model_no.to_string(),
            sellable: levels.sellable(),
            booked: levels.booked,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, name: &str, levels: StockLevels) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            model_no: format!("M-{id}"),
            name: name.to_string(),
            description: None,
            size: None,
            finish: None,
            manufacturer_id: None,
            category_id: None,
            remarks: None,
            internal_notes: None,
            total_stock: levels.total,
            bad_stock: levels.bad,
            dead_stock: levels.dead,
            booked_stock: levels.booked,
            available_stock: levels.available(),
            created_at: now,
            updated_at: now,
        }
    }

    fn line(product_id: &str, quantity: i64) -> BookingItemInput {
        BookingItemInput {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_available_formula() {
        let levels = StockLevels::new(100, 5, 3, 20);
        assert_eq!(levels.sellable(), 92);
        assert_eq!(levels.available(), 72);
    }

    #[test]
    fn test_available_is_not_clamped() {
        let levels = StockLevels::new(10, 0, 0, 15);
        assert_eq!(levels.available(), -5);
    }

    #[test]
    fn test_stock_status_thresholds() {
        assert_eq!(StockStatus::classify(-3), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(1), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(10), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(11), StockStatus::InStock);
    }

    #[test]
    fn test_booking_within_available_passes() {
        let products = vec![product("a", "Tile A", StockLevels::new(10, 0, 0, 0))];
        let result = check_overbooking(&[line("a", 10)], &products, &HashMap::new());
        assert!(result.is_ok());
    }

    #[test]
    fn test_overbooking_reports_every_offender() {
        let products = vec![
            product("a", "Tile A", StockLevels::new(5, 0, 0, 0)),
            product("b", "Tile B", StockLevels::new(50, 0, 0, 0)),
            product("c", "Tile C", StockLevels::new(3, 1, 0, 0)),
        ];
        let requested = [line("a", 6), line("b", 2), line("c", 3)];

        let err = check_overbooking(&requested, &products, &HashMap::new()).unwrap_err();
        match err {
            CoreError::Overbooked { products } => {
                let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["Tile A", "Tile C"]);
                assert_eq!(products[0].requested, 6);
                assert_eq!(products[0].allowance, 5);
                assert_eq!(products[1].allowance, 2);
            }
            other => panic!("expected Overbooked, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_lines_are_summed() {
        let products = vec![product("a", "Tile A", StockLevels::new(5, 0, 0, 0))];
        let requested = [line("a", 3), line("a", 3)];
        assert!(check_overbooking(&requested, &products, &HashMap::new()).is_err());

        let merged = merge_lines(&requested);
        assert_eq!(merged, vec![("a".to_string(), 6)]);
    }

    #[test]
    fn test_huge_duplicate_lines_do_not_wrap() {
        let products = vec![product("a", "Tile A", StockLevels::new(1, 0, 0, 0))];
        let requested = [line("a", i64::MAX), line("a", i64::MAX), line("a", 3)];

        let merged = merge_lines(&requested);
        assert_eq!(merged, vec![("a".to_string(), i64::MAX)]);

        let err = check_overbooking(&requested, &products, &HashMap::new()).unwrap_err();
        match err {
            CoreError::Overbooked { products } => {
                assert_eq!(products[0].requested, i64::MAX);
                assert_eq!(products[0].allowance, 1);
            }
            other => panic!("expected Overbooked, got {other:?}"),
        }
    }

    #[test]
    fn test_huge_prior_reservation_saturates() {
        let products = vec![product("a", "Tile A", StockLevels::new(10, 0, 0, 0))];
        let prior = HashMap::from([("a".to_string(), i64::MAX)]);
        assert!(check_overbooking(&[line("a", 5)], &products, &prior).is_ok());
    }

    #[test]
    fn test_edit_counts_own_reservation() {
        // 10 on hand, this booking already holds 8 of them
        let products = vec![product("a", "Tile A", StockLevels::new(10, 0, 0, 8))];
        let prior = HashMap::from([("a".to_string(), 8)]);

        assert!(check_overbooking(&[line("a", 10)], &products, &prior).is_ok());
        assert!(check_overbooking(&[line("a", 11)], &products, &prior).is_err());
        // Without the prior reservation only 2 remain
        assert!(check_overbooking(&[line("a", 3)], &products, &HashMap::new()).is_err());
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let err = check_overbooking(&[line("ghost", 1)], &[], &HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_reserved_by_product_sums_items() {
        let now = Utc::now();
        let item = |product_id: &str, quantity| BookingItem {
            id: format!("i-{product_id}-{quantity}"),
            booking_id: "b".to_string(),
            product_id: product_id.to_string(),
            model_no: String::new(),
            product_name: String::new(),
            quantity,
            created_at: now,
        };
        let reserved = reserved_by_product(&[item("a", 2), item("b", 1), item("a", 4)]);
        assert_eq!(reserved.get("a"), Some(&6));
        assert_eq!(reserved.get("b"), Some(&1));
    }

    #[test]
    fn test_stock_adjustment_below_reserved() {
        assert!(check_stock_adjustment("M-1", StockLevels::new(10, 0, 0, 10)).is_ok());
        let err = check_stock_adjustment("M-1", StockLevels::new(10, 2, 0, 10)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::StockBelowReserved { sellable: 8, booked: 10, .. }
        ));
    }
}
