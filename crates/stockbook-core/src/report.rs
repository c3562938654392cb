//! # Reports and List Views
//!
//! Pure shaping of already-loaded records: dashboard totals, product list
//! filtering and sorting, bookings grouped by customer, and the
//! per-manufacturer view.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::stock::{StockStatus, LOW_STOCK_THRESHOLD};
use crate::types::{Booking, Category, Manufacturer, Product};

/// Name shown for products with no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

// =============================================================================
// Overview
// =============================================================================

/// Dashboard headline numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OverviewStats {
    pub total_stock: i64,
    pub total_bookings: i64,
    /// Products with fewer than `LOW_STOCK_THRESHOLD` units available.
    pub low_stock_items: i64,
    pub total_available: i64,
}

impl OverviewStats {
    pub fn compute(products: &[Product], total_bookings: i64) -> Self {
        OverviewStats {
            total_stock: products.iter().map(|p| p.total_stock).sum(),
            total_bookings,
            low_stock_items: products
                .iter()
                .filter(|p| p.available_stock < LOW_STOCK_THRESHOLD)
                .count() as i64,
            total_available: products.iter().map(|p| p.available_stock).sum(),
        }
    }
}

// =============================================================================
// Product Query
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockFilter {
    #[default]
    All,
    Low,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Name,
    ModelNo,
    TotalStock,
    AvailableStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Product list filters as sent in a query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductQuery {
    /// Case-insensitive substring of name or model number.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub stock: StockFilter,
    #[serde(default)]
    pub sort: ProductSort,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub manufacturer_id: Option<String>,
}

impl ProductQuery {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(id) = self.manufacturer_id.as_deref() {
            if product.manufacturer_id.as_deref() != Some(id) {
                return false;
            }
        }

        match self.stock {
            StockFilter::All => {}
            StockFilter::Low if product.stock_status() != StockStatus::LowStock => return false,
            StockFilter::Out if product.stock_status() != StockStatus::OutOfStock => return false,
            _ => {}
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => matches_search(product, term),
            None => true,
        }
    }

    /// Filters then sorts.
    pub fn apply(&self, mut products: Vec<Product>) -> Vec<Product> {
        products.retain(|p| self.matches(p));
        products.sort_by(|a, b| {
            let ordering = match self.sort {
                ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                ProductSort::ModelNo => a.model_no.cmp(&b.model_no),
                ProductSort::TotalStock => a.total_stock.cmp(&b.total_stock),
                ProductSort::AvailableStock => a.available_stock.cmp(&b.available_stock),
            };
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        products
    }
}

/// Case-insensitive substring match on name or model number.
pub fn matches_search(product: &Product, term: &str) -> bool {
    let term = term.to_lowercase();
    product.name.to_lowercase().contains(&term) || product.model_no.to_lowercase().contains(&term)
}

// =============================================================================
// Bookings by Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerBookings {
    pub customer_id: String,
    pub customer_name: String,
    pub bookings: Vec<Booking>,
    pub total_amount: Money,
    pub total_quantity: i64,
}

/// Groups bookings per customer, ordered by customer name.
///
/// Bookings keep their incoming order inside each group.
pub fn group_by_customer(bookings: Vec<Booking>) -> Vec<CustomerBookings> {
    let mut groups: Vec<CustomerBookings> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for booking in bookings {
        let slot = *index.entry(booking.customer_id.clone()).or_insert_with(|| {
            groups.push(CustomerBookings {
                customer_id: booking.customer_id.clone(),
                customer_name: booking.customer_name.clone(),
                bookings: Vec::new(),
                total_amount: Money::zero(),
                total_quantity: 0,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.total_amount += booking.total_amount();
        group.total_quantity += booking.total_quantity();
        group.bookings.push(booking);
    }

    groups.sort_by(|a, b| {
        a.customer_name
            .to_lowercase()
            .cmp(&b.customer_name.to_lowercase())
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    groups
}

// =============================================================================
// Manufacturer View
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryCount {
    pub category_id: Option<String>,
    pub name: String,
    pub count: i64,
}

/// Product count per category, largest first.
pub fn category_counts(products: &[Product], categories: &[Category]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();

    for product in products {
        match counts
            .iter_mut()
            .find(|c| c.category_id == product.category_id)
        {
            Some(entry) => entry.count += 1,
            None => {
                let name = product
                    .category_id
                    .as_deref()
                    .and_then(|id| categories.iter().find(|c| c.id == id))
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string());
                counts.push(CategoryCount {
                    category_id: product.category_id.clone(),
                    name,
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| match b.count.cmp(&a.count) {
        Ordering::Equal => a.name.cmp(&b.name),
        other => other,
    });
    counts
}

/// One manufacturer with its products and stock breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManufacturerOverview {
    pub manufacturer: Manufacturer,
    pub products: Vec<Product>,
    pub category_counts: Vec<CategoryCount>,
    pub total_stock: i64,
    pub total_available: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
}

impl ManufacturerOverview {
    pub fn build(manufacturer: Manufacturer, products: Vec<Product>, categories: &[Category]) -> Self {
        let status_count = |status: StockStatus| {
            products.iter().filter(|p| p.stock_status() == status).count() as i64
        };

        ManufacturerOverview {
            category_counts: category_counts(&products, categories),
            total_stock: products.iter().map(|p| p.total_stock).sum(),
            total_available: products.iter().map(|p| p.available_stock).sum(),
            low_stock: status_count(StockStatus::LowStock),
            out_of_stock: status_count(StockStatus::OutOfStock),
            manufacturer,
            products,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
