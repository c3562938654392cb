//! # Product Columns
//!
//! The named columns of the product table. One list drives three things:
//! which fields a viewer may see, CSV export headers, and CSV import header
//! matching.
//!
//! ```text
//! ProductColumn::Manufacturer
//!     key   = "manufacturer"
//!     label = "Manufacturer"
//!     value = factory name resolved through CatalogNames
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{Category, Manufacturer, Product};

// =============================================================================
// Product Column
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductColumn {
    ModelNo,
    Name,
    Description,
    Size,
    Finish,
    Manufacturer,
    Category,
    Remarks,
    InternalNotes,
    TotalStock,
    BadStock,
    DeadStock,
    BookedStock,
    AvailableStock,
}

impl ProductColumn {
    /// Every column in display order.
    pub const ALL: [ProductColumn; 14] = [
        ProductColumn::ModelNo,
        ProductColumn::Name,
        ProductColumn::Description,
        ProductColumn::Size,
        ProductColumn::Finish,
        ProductColumn::Manufacturer,
        ProductColumn::Category,
        ProductColumn::Remarks,
        ProductColumn::InternalNotes,
        ProductColumn::TotalStock,
        ProductColumn::BadStock,
        ProductColumn::DeadStock,
        ProductColumn::BookedStock,
        ProductColumn::AvailableStock,
    ];

    /// Columns a new viewer sees when none were assigned.
    pub const VIEWER_DEFAULT: [ProductColumn; 4] = [
        ProductColumn::ModelNo,
        ProductColumn::Name,
        ProductColumn::Size,
        ProductColumn::AvailableStock,
    ];

    pub const fn key(&self) -> &'static str {
        match self {
            ProductColumn::ModelNo => "model_no",
            ProductColumn::Name => "name",
            ProductColumn::Description => "description",
            ProductColumn::Size => "size",
            ProductColumn::Finish => "finish",
            ProductColumn::Manufacturer => "manufacturer",
            ProductColumn::Category => "category",
            ProductColumn::Remarks => "remarks",
            ProductColumn::InternalNotes => "internal_notes",
            ProductColumn::TotalStock => "total_stock",
            ProductColumn::BadStock => "bad_stock",
            ProductColumn::DeadStock => "dead_stock",
            ProductColumn::BookedStock => "booked_stock",
            ProductColumn::AvailableStock => "available_stock",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ProductColumn::ModelNo => "Model Number",
            ProductColumn::Name => "Name",
            ProductColumn::Description => "Description",
            ProductColumn::Size => "Size",
            ProductColumn::Finish => "Finish",
            ProductColumn::Manufacturer => "Manufacturer",
            ProductColumn::Category => "Category",
            ProductColumn::Remarks => "Remarks",
            ProductColumn::InternalNotes => "Internal Notes",
            ProductColumn::TotalStock => "Total Stock",
            ProductColumn::BadStock => "Bad Stock",
            ProductColumn::DeadStock => "Dead Stock",
            ProductColumn::BookedStock => "Booked Stock",
            ProductColumn::AvailableStock => "Available Stock",
        }
    }

    /// Computed by the backend; ignored on import.
    pub const fn is_derived(&self) -> bool {
        matches!(
            self,
            ProductColumn::BookedStock | ProductColumn::AvailableStock
        )
    }

    /// Admin/manager-only column.
    pub const fn is_internal(&self) -> bool {
        matches!(self, ProductColumn::InternalNotes)
    }

    /// Matches a CSV header against key, label, or a legacy `*_id` alias.
    ///
    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn from_header(header: &str) -> Option<Self> {
        let normalized = header.trim().to_lowercase();
        let normalized = match normalized.as_str() {
            "manufacturer_id" => "manufacturer",
            "category_id" => "category",
            other => other,
        };

        ProductColumn::ALL.into_iter().find(|column| {
            column.key() == normalized || column.label().to_lowercase() == normalized
        })
    }

    /// The column's value for `product` as JSON.
    pub fn value(&self, product: &Product, names: &CatalogNames) -> Value {
        let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        match self {
            ProductColumn::ModelNo => Value::String(product.model_no.clone()),
            ProductColumn::Name => Value::String(product.name.clone()),
            ProductColumn::Description => text(&product.description),
            ProductColumn::Size => text(&product.size),
            ProductColumn::Finish => text(&product.finish),
            ProductColumn::Manufacturer => names
                .manufacturer(product.manufacturer_id.as_deref())
                .map(|n| Value::String(n.to_string()))
                .unwrap_or(Value::Null),
            ProductColumn::Category => names
                .category(product.category_id.as_deref())
                .map(|n| Value::String(n.to_string()))
                .unwrap_or(Value::Null),
            ProductColumn::Remarks => text(&product.remarks),
            ProductColumn::InternalNotes => text(&product.internal_notes),
            ProductColumn::TotalStock => Value::from(product.total_stock),
            ProductColumn::BadStock => Value::from(product.bad_stock),
            ProductColumn::DeadStock => Value::from(product.dead_stock),
            ProductColumn::BookedStock => Value::from(product.booked_stock),
            ProductColumn::AvailableStock => Value::from(product.available_stock),
        }
    }

    /// The column's value as a CSV cell.
    pub fn cell(&self, product: &Product, names: &CatalogNames) -> String {
        match self.value(product, names) {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ProductColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ProductColumn {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductColumn::ALL
            .into_iter()
            .find(|column| column.key() == s.trim())
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "column".to_string(),
                allowed: ProductColumn::ALL
                    .iter()
                    .map(|c| c.key().to_string())
                    .collect(),
            })
    }
}

/// Parses a comma-separated column list such as `model_no,name,available_stock`.
///
/// An empty list yields every column.
pub fn parse_column_list(list: &str) -> Result<Vec<ProductColumn>, ValidationError> {
    let columns = list
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        Ok(ProductColumn::ALL.to_vec())
    } else {
        Ok(columns)
    }
}

// =============================================================================
// Catalog Names
// =============================================================================

/// Id → display name lookups for manufacturer and category columns.
#[derive(Debug, Clone, Default)]
pub struct CatalogNames {
    manufacturers: HashMap<String, String>,
    categories: HashMap<String, String>,
}

impl CatalogNames {
    pub fn new(manufacturers: &[Manufacturer], categories: &[Category]) -> Self {
        CatalogNames {
            manufacturers: manufacturers
                .iter()
                .map(|m| (m.id.clone(), m.factory_name.clone()))
                .collect(),
            categories: categories
                .iter()
                .map(|c| (c.id.clone(), c.name.clone()))
                .collect(),
        }
    }

    pub fn manufacturer(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.manufacturers.get(id)).map(String::as_str)
    }

    pub fn category(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.categories.get(id)).map(String::as_str)
    }
}

// =============================================================================
// Projection
// =============================================================================

/// Reduces a product to `id` plus the given columns.
///
/// Used for viewers, who only see the columns assigned to them.
pub fn project_product(product: &Product, columns: &[ProductColumn], names: &CatalogNames) -> Value {
    let mut object = Map::with_capacity(columns.len() + 1);
    object.insert("id".to_string(), Value::String(product.id.clone()));
    for column in columns {
        object.insert(column.key().to_string(), column.value(product, names));
    }
    Value::Object(object)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> (Product, CatalogNames) {
        let now = Utc::now();
        let manufacturer = Manufacturer {
            id: "m1".to_string(),
            factory_name: "Morbi Ceramics".to_string(),
            contact_person: None,
            contact_info: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let product = Product {
            id: "p1".to_string(),
            model_no: "GT-6060".to_string(),
            name: "Glazed Tile".to_string(),
            description: None,
            size: Some("600x600".to_string()),
            finish: Some("Gloss".to_string()),
            manufacturer_id: Some("m1".to_string()),
            category_id: None,
            remarks: None,
            internal_notes: Some("buy price 410".to_string()),
            total_stock: 40,
            bad_stock: 2,
            dead_stock: 0,
            booked_stock: 8,
            available_stock: 30,
            created_at: now,
            updated_at: now,
        };
        (product, CatalogNames::new(&[manufacturer], &[]))
    }

    #[test]
    fn test_from_header_matches_key_label_and_alias() {
        assert_eq!(ProductColumn::from_header("model_no"), Some(ProductColumn::ModelNo));
        assert_eq!(ProductColumn::from_header(" Model Number "), Some(ProductColumn::ModelNo));
        assert_eq!(ProductColumn::from_header("TOTAL STOCK"), Some(ProductColumn::TotalStock));
        assert_eq!(
            ProductColumn::from_header("manufacturer_id"),
            Some(ProductColumn::Manufacturer)
        );
        assert_eq!(ProductColumn::from_header("colour"), None);
    }

    #[test]
    fn test_parse_column_list() {
        let columns = parse_column_list("model_no, available_stock").unwrap();
        assert_eq!(columns, vec![ProductColumn::ModelNo, ProductColumn::AvailableStock]);
        assert_eq!(parse_column_list("").unwrap().len(), ProductColumn::ALL.len());
        assert!(parse_column_list("model_no,price").is_err());
    }

    #[test]
    fn test_projection_only_contains_assigned_columns() {
        let (product, names) = sample();
        let projected = project_product(
            &product,
            &[ProductColumn::ModelNo, ProductColumn::Manufacturer, ProductColumn::AvailableStock],
            &names,
        );

        let object = projected.as_object().unwrap();
        assert_eq!(object.len(), 4);
        assert_eq!(object["id"], "p1");
        assert_eq!(object["manufacturer"], "Morbi Ceramics");
        assert_eq!(object["available_stock"], 30);
        assert!(!object.contains_key("internal_notes"));
    }

    #[test]
    fn test_cell_formats_missing_as_empty() {
        let (product, names) = sample();
        assert_eq!(ProductColumn::Description.cell(&product, &names), "");
        assert_eq!(ProductColumn::Category.cell(&product, &names), "");
        assert_eq!(ProductColumn::BookedStock.cell(&product, &names), "8");
    }

    #[test]
    fn test_column_serde_uses_key() {
        let json = serde_json::to_string(&ProductColumn::AvailableStock).unwrap();
        assert_eq!(json, "\"available_stock\"");
        assert_eq!(ProductColumn::InternalNotes.to_string(), "internal_notes");
    }
}
