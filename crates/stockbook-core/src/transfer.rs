//! # CSV Transfer
//!
//! Bulk product import and export.
//!
//! ## Import Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  raw bytes                                                              │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  header row ──► ProductColumn::from_header per cell                     │
//! │      │           (unknown headers ignored, derived columns ignored,     │
//! │      │            model_no + name must be present)                      │
//! │      ▼                                                                  │
//! │  each data row ──► ProductImportRow (row number kept)                   │
//! │      │              parse/validation failure ──► CoreError::Import      │
//! │      ▼                                                                  │
//! │  Vec<ProductImportRow>  (all rows or none)                              │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  repository resolves manufacturer/category refs, upserts by model_no    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use serde::{Deserialize, Serialize};

use crate::columns::{CatalogNames, ProductColumn};
use crate::error::{CoreError, CoreResult};
use crate::types::{Product, ProductInput};
use crate::validation::{validate_model_no, validate_name, validate_stock_counts, MAX_NAME_LEN};

// =============================================================================
// Import
// =============================================================================

/// One parsed data row.
///
/// `manufacturer` and `category` hold whatever the file contained: an id or
/// a display name. The repository resolves them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductImportRow {
    /// 1-based data row number, for error messages.
    pub row: usize,
    pub model_no: String,
    pub name: String,
    pub description: Option<String>,
    pub size: Option<String>,
    pub finish: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub remarks: Option<String>,
    pub internal_notes: Option<String>,
    pub total_stock: i64,
    pub bad_stock: i64,
    pub dead_stock: i64,
}

impl ProductImportRow {
    /// Converts into a product input once references are resolved.
    pub fn into_input(self, manufacturer_id: Option<String>, category_id: Option<String>) -> ProductInput {
        ProductInput {
            model_no: self.model_no,
            name: self.name,
            description: self.description,
            size: self.size,
            finish: self.finish,
            manufacturer_id,
            category_id,
            remarks: self.remarks,
            internal_notes: self.internal_notes,
            total_stock: self.total_stock,
            bad_stock: self.bad_stock,
            dead_stock: self.dead_stock,
        }
    }
}

/// Parses a product CSV.
///
/// ## Rules
/// - First non-empty line is the header
/// - Blank lines are skipped
/// - Stock cells must be integers; blank means 0
/// - The first failing row aborts the parse
pub fn parse_product_csv(data: &[u8]) -> CoreResult<Vec<ProductImportRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| CoreError::CsvHeader(e.to_string()))?
        .clone();

    let mapping: Vec<Option<ProductColumn>> = headers
        .iter()
        .map(|h| ProductColumn::from_header(h).filter(|c| !c.is_derived()))
        .collect();

    for required in [ProductColumn::ModelNo, ProductColumn::Name] {
        if !mapping.contains(&Some(required)) {
            return Err(CoreError::CsvHeader(format!(
                "missing required column '{}'",
                required.key()
            )));
        }
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| CoreError::Import {
            row,
            reason: e.to_string(),
        })?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        rows.push(parse_row(row, &mapping, &record)?);
    }

    Ok(rows)
}

fn parse_row(
    row: usize,
    mapping: &[Option<ProductColumn>],
    record: &StringRecord,
) -> CoreResult<ProductImportRow> {
    let fail = |reason: String| CoreError::Import { row, reason };
    let mut parsed = ProductImportRow {
        row,
        ..Default::default()
    };

    for (column, cell) in mapping.iter().zip(record.iter()) {
        let Some(column) = column else { continue };
        let text = (!cell.is_empty()).then(|| cell.to_string());
        let count = || -> CoreResult<i64> {
            if cell.is_empty() {
                return Ok(0);
            }
            cell.parse::<i64>()
                .map_err(|_| fail(format!("{} '{}' is not a whole number", column.key(), cell)))
        };

        match column {
            ProductColumn::ModelNo => parsed.model_no = cell.to_string(),
            ProductColumn::Name => parsed.name = cell.to_string(),
            ProductColumn::Description => parsed.description = text,
            ProductColumn::Size => parsed.size = text,
            ProductColumn::Finish => parsed.finish = text,
            ProductColumn::Manufacturer => parsed.manufacturer = text,
            ProductColumn::Category => parsed.category = text,
            ProductColumn::Remarks => parsed.remarks = text,
            ProductColumn::InternalNotes => parsed.internal_notes = text,
            ProductColumn::TotalStock => parsed.total_stock = count()?,
            ProductColumn::BadStock => parsed.bad_stock = count()?,
            ProductColumn::DeadStock => parsed.dead_stock = count()?,
            ProductColumn::BookedStock | ProductColumn::AvailableStock => {}
        }
    }

    validate_model_no(&parsed.model_no).map_err(|e| fail(e.to_string()))?;
    validate_name("name", &parsed.name, MAX_NAME_LEN).map_err(|e| fail(e.to_string()))?;
    validate_stock_counts(parsed.total_stock, parsed.bad_stock, parsed.dead_stock)
        .map_err(|e| fail(e.to_string()))?;

    Ok(parsed)
}

// =============================================================================
// Export
// =============================================================================

/// Writes products as CSV with one header row of column labels.
pub fn export_products_csv(
    products: &[Product],
    columns: &[ProductColumn],
    names: &CatalogNames,
) -> CoreResult<String> {
    let mut writer = Writer::from_writer(Vec::new());

    writer
        .write_record(columns.iter().map(|c| c.label()))
        .map_err(|e| CoreError::Export(e.to_string()))?;

    for product in products {
        writer
            .write_record(columns.iter().map(|c| c.cell(product, names)))
            .map_err(|e| CoreError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Export(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| CoreError::Export(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_with_keys() {
        let csv = "model_no,name,description,manufacturer_id,remarks,internal_notes,total_stock,bad_stock,dead_stock\n\
                   GT-1,Glazed Tile,Floor tile,Morbi Ceramics,,,100,2,1\n\
                   \n\
                   WB-7,Wash Basin,,,,fragile,12,,\n";

        let rows = parse_product_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].model_no, "GT-1");
        assert_eq!(rows[0].manufacturer.as_deref(), Some("Morbi Ceramics"));
        assert_eq!(rows[0].remarks, None);
        assert_eq!((rows[0].total_stock, rows[0].bad_stock, rows[0].dead_stock), (100, 2, 1));

        assert_eq!(rows[1].model_no, "WB-7");
        assert_eq!(rows[1].internal_notes.as_deref(), Some("fragile"));
        assert_eq!(rows[1].bad_stock, 0);
    }

    #[test]
    fn test_parse_with_labels_and_ignored_columns() {
        let csv = "Model Number,Name,Colour,Available Stock,Total Stock\n\
                   GT-2,Matt Tile,grey,999,30\n";

        let rows = parse_product_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Matt Tile");
        assert_eq!(rows[0].total_stock, 30);
    }

    #[test]
    fn test_missing_required_header() {
        let err = parse_product_csv(b"name,total_stock\nTile,4\n").unwrap_err();
        assert!(matches!(err, CoreError::CsvHeader(msg) if msg.contains("model_no")));
    }

    #[test]
    fn test_bad_number_names_row() {
        let csv = "model_no,name,total_stock\nA-1,One,5\nA-2,Two,five\n";
        let err = parse_product_csv(csv.as_bytes()).unwrap_err();
        match err {
            CoreError::Import { row, reason } => {
                assert_eq!(row, 2);
                assert!(reason.contains("total_stock"));
            }
            other => panic!("expected Import error, got {other:?}"),
        }
    }

    #[test]
    fn test_row_validation_failure() {
        let csv = "model_no,name,total_stock,bad_stock\nA-1,One,5,9\n";
        let err = parse_product_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::Import { row: 1, .. }));

        let csv = "model_no,name\n,Nameless\n";
        assert!(matches!(
            parse_product_csv(csv.as_bytes()).unwrap_err(),
            CoreError::Import { row: 1, .. }
        ));
    }

    #[test]
    fn test_export_writes_labels_and_values() {
        let now = Utc::now();
        let product = Product {
            id: "p1".to_string(),
            model_no: "GT-1".to_string(),
            name: "Tile, glazed".to_string(),
            description: None,
            size: None,
            finish: None,
            manufacturer_id: None,
            category_id: None,
            remarks: None,
            internal_notes: None,
            total_stock: 10,
            bad_stock: 1,
            dead_stock: 0,
            booked_stock: 4,
            available_stock: 5,
            created_at: now,
            updated_at: now,
        };

        let csv = export_products_csv(
            &[product],
            &[ProductColumn::ModelNo, ProductColumn::Name, ProductColumn::AvailableStock],
            &CatalogNames::default(),
        )
        .unwrap();

        assert_eq!(csv, "Model Number,Name,Available Stock\nGT-1,\"Tile, glazed\",5\n");
    }
}
