//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Derived Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where Product Numbers Come From                      │
//! │                                                                         │
//! │  products table            product_stock view                          │
//! │  ┌──────────────────┐      ┌──────────────────────────────────────┐    │
//! │  │ total_stock  120 │      │ booked_stock = SUM(booking_items.qty)│    │
//! │  │ bad_stock      4 │      │   WHERE booking.status != cancelled  │    │
//! │  │ dead_stock     6 │      │                                  30  │    │
//! │  └────────┬─────────┘      └──────────────────┬───────────────────┘    │
//! │           └──────────── LEFT JOIN ────────────┘                         │
//! │                             │                                           │
//! │                             ▼                                           │
//! │          StockLevels::available() = 120 - 4 - 6 - 30 = 80              │
//! │                                                                         │
//! │  booked/available are never written. Every read recomputes them.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Edits
//! An edit that would leave fewer sellable units than are booked is
//! rejected with `StockBelowReserved`. Cancel or edit bookings first.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::activity::record;
use super::category::fetch_category;
use super::manufacturer::{fetch_manufacturer, resolve_manufacturer};
use super::{commit, contains_pattern, new_id, non_blank, placeholders, snapshot, RepoContext};
use crate::error::{DbError, DbResult};
use stockbook_core::report::ProductQuery;
use stockbook_core::stock::check_stock_adjustment;
use stockbook_core::transfer::ProductImportRow;
use stockbook_core::validation::{validate_product_input, validate_search_query};
use stockbook_core::{
    ActionType, ActivityEntry, Category, CoreError, EntityType, Product, ProductInput, StockLevels,
};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    model_no: String,
    name: String,
    description: Option<String>,
    size: Option<String>,
    finish: Option<String>,
    manufacturer_id: Option<String>,
    category_id: Option<String>,
    remarks: Option<String>,
    internal_notes: Option<String>,
    total_stock: i64,
    bad_stock: i64,
    dead_stock: i64,
    booked_stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let levels = StockLevels::new(row.total_stock, row.bad_stock, row.dead_stock, row.booked_stock);
        Product {
            id: row.id,
            model_no: row.model_no,
            name: row.name,
            description: row.description,
            size: row.size,
            finish: row.finish,
            manufacturer_id: row.manufacturer_id,
            category_id: row.category_id,
            remarks: row.remarks,
            internal_notes: row.internal_notes,
            total_stock: row.total_stock,
            bad_stock: row.bad_stock,
            dead_stock: row.dead_stock,
            booked_stock: row.booked_stock,
            available_stock: levels.available(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT
        p.id,
        p.model_no,
        p.name,
        p.description,
        p.size,
        p.finish,
        p.manufacturer_id,
        p.category_id,
        p.remarks,
        p.internal_notes,
        p.total_stock,
        p.bad_stock,
        p.dead_stock,
        COALESCE(s.booked_stock, 0) AS booked_stock,
        p.created_at,
        p.updated_at
    FROM products p
    LEFT JOIN product_stock s ON s.product_id = p.id
"#;

/// Outcome of a CSV import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let hits = repo.search("basin", 5).await?;
/// let product = repo.create(&user.id, &input).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    ctx: RepoContext,
}

impl ProductRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ProductRepository { ctx }
    }

    /// All products, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("{PRODUCT_SELECT} ORDER BY p.name COLLATE NOCASE, p.model_no");
        let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&self.ctx.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Products matching a dashboard list query, filtered and sorted.
    pub async fn query(&self, query: &ProductQuery) -> DbResult<Vec<Product>> {
        if let Some(search) = query.search.as_deref() {
            validate_search_query(search)?;
        }
        let products = match query.manufacturer_id.as_deref() {
            Some(id) => self.list_by_manufacturer(id).await?,
            None => self.list().await?,
        };
        Ok(query.apply(products))
    }

    /// Case-insensitive substring search on name and model number.
    ///
    /// An empty query returns the first `limit` products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, limit = %limit, "Searching products");

        let rows: Vec<ProductRow> = if query.is_empty() {
            let sql = format!("{PRODUCT_SELECT} ORDER BY p.name COLLATE NOCASE LIMIT ?1");
            sqlx::query_as(&sql)
                .bind(limit)
                .fetch_all(&self.ctx.pool)
                .await?
        } else {
            let sql = format!(
                "{PRODUCT_SELECT} WHERE p.name LIKE ?1 ESCAPE '\\' OR p.model_no LIKE ?1 ESCAPE '\\' \
                 ORDER BY p.name COLLATE NOCASE LIMIT ?2"
            );
            sqlx::query_as(&sql)
                .bind(contains_pattern(query))
                .bind(limit)
                .fetch_all(&self.ctx.pool)
                .await?
        };

        debug!(count = rows.len(), "Search returned products");
        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn list_by_manufacturer(&self, manufacturer_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "{PRODUCT_SELECT} WHERE p.manufacturer_id = ?1 ORDER BY p.name COLLATE NOCASE, p.model_no"
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(manufacturer_id)
            .fetch_all(&self.ctx.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.ctx.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    pub async fn get_by_model_no(&self, model_no: &str) -> DbResult<Option<Product>> {
        let mut conn = self.ctx.pool.acquire().await?;
        fetch_by_model_no(&mut conn, model_no.trim()).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.ctx.pool)
            .await?;
        Ok(count)
    }

    /// Creates a product.
    ///
    /// ## Returns
    /// * `Err(UniqueViolation)` - Model number already exists
    /// * `Err(NotFound)` - Manufacturer or category does not exist
    pub async fn create(&self, actor: &str, input: &ProductInput) -> DbResult<Product> {
        validate_product_input(input)?;
        debug!(model_no = %input.model_no, "Creating product");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        if fetch_by_model_no(&mut tx, input.model_no.trim()).await?.is_some() {
            return Err(DbError::duplicate("model_no", input.model_no.trim()));
        }
        ensure_references(&mut tx, input).await?;

        let product = insert_product(&mut tx, input).await?;
        record(&mut tx, actor, &created_entry(&product)?).await?;
        commit(tx).await?;

        self.ctx
            .publish(EntityType::Product, ActionType::Create, Some(&product.id));
        Ok(product)
    }

    /// Replaces a product's editable fields.
    ///
    /// ## Returns
    /// * `Err(Rejected(StockBelowReserved))` - New counts do not cover bookings
    /// * `Err(UniqueViolation)` - New model number belongs to another product
    pub async fn update(&self, actor: &str, id: &str, input: &ProductInput) -> DbResult<Product> {
        validate_product_input(input)?;
        debug!(id = %id, "Updating product");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_product(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        ensure_references(&mut tx, input).await?;

        let after = apply_update(&mut tx, &before, input).await?;
        record(&mut tx, actor, &updated_entry(&before, &after)?).await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Product, ActionType::Update, Some(id));
        Ok(after)
    }

    /// Creates the product or updates the one with the same model number.
    pub async fn upsert_by_model_no(&self, actor: &str, input: &ProductInput) -> DbResult<Product> {
        validate_product_input(input)?;
        debug!(model_no = %input.model_no, "Upserting product");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        ensure_references(&mut tx, input).await?;

        let (product, action) = match fetch_by_model_no(&mut tx, input.model_no.trim()).await? {
            Some(before) => {
                let after = apply_update(&mut tx, &before, input).await?;
                record(&mut tx, actor, &updated_entry(&before, &after)?).await?;
                (after, ActionType::Update)
            }
            None => {
                let product = insert_product(&mut tx, input).await?;
                record(&mut tx, actor, &created_entry(&product)?).await?;
                (product, ActionType::Create)
            }
        };
        commit(tx).await?;

        self.ctx.publish(EntityType::Product, action, Some(&product.id));
        Ok(product)
    }

    /// Deletes a product that no booking references.
    ///
    /// ## Returns
    /// * `Err(Rejected(ProductHasBookings))` - Bookings still list it
    pub async fn delete(&self, actor: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_product(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        let bookings: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT booking_id) FROM booking_items WHERE product_id = ?1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if bookings > 0 {
            return Err(CoreError::ProductHasBookings {
                model_no: before.model_no,
                count: bookings,
            }
            .into());
        }

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::deleted(
                EntityType::Product,
                id,
                format!("Deleted product {}", before.model_no),
                snapshot(&before)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Product, ActionType::Delete, Some(id));
        Ok(())
    }

    /// Imports parsed CSV rows, upserting by model number.
    ///
    /// ## Behavior
    /// - Manufacturer and category cells are resolved by id or by name
    ///   (ignoring case); an unknown reference fails the row
    /// - Rows repeating a model number update the row imported before them
    /// - Any failure rolls back the whole import
    /// - One activity entry covers the import
    pub async fn import(&self, actor: &str, rows: Vec<ProductImportRow>) -> DbResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        if rows.is_empty() {
            return Ok(summary);
        }

        info!(rows = rows.len(), "Importing products");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let mut model_nos = Vec::with_capacity(rows.len());

        for row in rows {
            let row_no = row.row;
            let row_error = |reason: String| CoreError::Import {
                row: row_no,
                reason,
            };

            let manufacturer_id = match row.manufacturer.as_deref() {
                Some(value) => Some(
                    resolve_manufacturer(&mut tx, value)
                        .await?
                        .ok_or_else(|| row_error(format!("unknown manufacturer '{value}'")))?
                        .id,
                ),
                None => None,
            };
            let category_id = match row.category.as_deref() {
                Some(value) => Some(
                    resolve_category(&mut tx, value)
                        .await?
                        .ok_or_else(|| row_error(format!("unknown category '{value}'")))?
                        .id,
                ),
                None => None,
            };

            let input = row.into_input(manufacturer_id, category_id);
            validate_product_input(&input).map_err(|e| row_error(e.to_string()))?;

            match fetch_by_model_no(&mut tx, input.model_no.trim()).await? {
                Some(before) => {
                    apply_update(&mut tx, &before, &input)
                        .await
                        .map_err(|e| match e {
                            DbError::Rejected(core) => row_error(core.to_string()).into(),
                            other => other,
                        })?;
                    summary.updated += 1;
                }
                None => {
                    insert_product(&mut tx, &input).await?;
                    summary.created += 1;
                }
            }
            model_nos.push(input.model_no.trim().to_string());
        }

        record(
            &mut tx,
            actor,
            &ActivityEntry::bulk(
                ActionType::Create,
                EntityType::Product,
                format!("Imported {} products via CSV", summary.total()),
                json!({
                    "created": summary.created,
                    "updated": summary.updated,
                    "model_nos": model_nos,
                }),
            ),
        )
        .await?;
        commit(tx).await?;

        info!(
            created = summary.created,
            updated = summary.updated,
            "Import complete"
        );
        let action = if summary.created > 0 {
            ActionType::Create
        } else {
            ActionType::Update
        };
        self.ctx.publish(EntityType::Product, action, None);
        Ok(summary)
    }
}

// =============================================================================
// Connection-level Helpers
// =============================================================================

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?1");
    let row: Option<ProductRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Product::from))
}

async fn fetch_by_model_no(conn: &mut SqliteConnection, model_no: &str) -> DbResult<Option<Product>> {
    let sql = format!("{PRODUCT_SELECT} WHERE p.model_no = ?1");
    let row: Option<ProductRow> = sqlx::query_as(&sql)
        .bind(model_no)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Product::from))
}

/// Current state of the given products. Unknown ids are simply absent.
pub(crate) async fn fetch_products_by_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> DbResult<Vec<Product>> {
    let unique: Vec<&String> = {
        let mut seen = HashSet::new();
        ids.iter().filter(|id| seen.insert(id.as_str())).collect()
    };
    if unique.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "{PRODUCT_SELECT} WHERE p.id IN ({})",
        placeholders(unique.len())
    );
    let mut query = sqlx::query_as::<_, ProductRow>(&sql);
    for id in unique {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(Product::from).collect())
}

async fn resolve_category(conn: &mut SqliteConnection, value: &str) -> DbResult<Option<Category>> {
    let value = value.trim();
    if let Some(found) = fetch_category(conn, value).await? {
        return Ok(Some(found));
    }

    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, description, created_at, updated_at FROM categories WHERE name = ?1 COLLATE NOCASE",
    )
    .bind(value)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(category)
}

async fn ensure_references(conn: &mut SqliteConnection, input: &ProductInput) -> DbResult<()> {
    if let Some(id) = input.manufacturer_id.as_deref() {
        if fetch_manufacturer(conn, id).await?.is_none() {
            return Err(DbError::not_found("Manufacturer", id));
        }
    }
    if let Some(id) = input.category_id.as_deref() {
        if fetch_category(conn, id).await?.is_none() {
            return Err(DbError::not_found("Category", id));
        }
    }
    Ok(())
}

async fn insert_product(conn: &mut SqliteConnection, input: &ProductInput) -> DbResult<Product> {
    let id = new_id();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO products (
            id, model_no, name, description, size, finish,
            manufacturer_id, category_id, remarks, internal_notes,
            total_stock, bad_stock, dead_stock,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13,
            ?14, ?14
        )
        "#,
    )
    .bind(&id)
    .bind(input.model_no.trim())
    .bind(input.name.trim())
    .bind(non_blank(&input.description))
    .bind(non_blank(&input.size))
    .bind(non_blank(&input.finish))
    .bind(&input.manufacturer_id)
    .bind(&input.category_id)
    .bind(non_blank(&input.remarks))
    .bind(non_blank(&input.internal_notes))
    .bind(input.total_stock)
    .bind(input.bad_stock)
    .bind(input.dead_stock)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    fetch_product(conn, &id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
}

/// Writes `input` over `before` after the model number and stock checks.
async fn apply_update(
    conn: &mut SqliteConnection,
    before: &Product,
    input: &ProductInput,
) -> DbResult<Product> {
    let model_no = input.model_no.trim();
    if model_no != before.model_no {
        if let Some(other) = fetch_by_model_no(conn, model_no).await? {
            if other.id != before.id {
                return Err(DbError::duplicate("model_no", model_no));
            }
        }
    }

    check_stock_adjustment(
        model_no,
        StockLevels::new(
            input.total_stock,
            input.bad_stock,
            input.dead_stock,
            before.booked_stock,
        ),
    )?;

    sqlx::query(
        r#"
        UPDATE products SET
            model_no = ?2,
            name = ?3,
            description = ?4,
            size = ?5,
            finish = ?6,
            manufacturer_id = ?7,
            category_id = ?8,
            remarks = ?9,
            internal_notes = ?10,
            total_stock = ?11,
            bad_stock = ?12,
            dead_stock = ?13,
            updated_at = ?14
        WHERE id = ?1
        "#,
    )
    .bind(&before.id)
    .bind(model_no)
    .bind(input.name.trim())
    .bind(non_blank(&input.description))
    .bind(non_blank(&input.size))
    .bind(non_blank(&input.finish))
    .bind(&input.manufacturer_id)
    .bind(&input.category_id)
    .bind(non_blank(&input.remarks))
    .bind(non_blank(&input.internal_notes))
    .bind(input.total_stock)
    .bind(input.bad_stock)
    .bind(input.dead_stock)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    fetch_product(conn, &before.id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", &before.id))
}

fn created_entry(product: &Product) -> DbResult<ActivityEntry> {
    Ok(ActivityEntry::created(
        EntityType::Product,
        &product.id,
        format!("Created product {}", product.model_no),
        snapshot(product)?,
    ))
}

fn updated_entry(before: &Product, after: &Product) -> DbResult<ActivityEntry> {
    Ok(ActivityEntry::updated(
        EntityType::Product,
        &after.id,
        format!("Updated product {}", after.model_no),
        snapshot(before)?,
        snapshot(after)?,
    ))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use stockbook_core::report::{ProductQuery, StockFilter};
    use stockbook_core::transfer::parse_product_csv;
    use stockbook_core::{
        BookingInput, BookingItemInput, CategoryInput, CoreError, CustomerInput, ManufacturerInput,
        ProductInput, ValidationError,
    };

    fn input(model_no: &str, total: i64) -> ProductInput {
        ProductInput {
            model_no: model_no.to_string(),
            name: format!("Product {model_no}"),
            total_stock: total,
            ..Default::default()
        }
    }

    async fn book(db: &Database, product_id: &str, quantity: i64) {
        let customer = db
            .customers()
            .create(
                "system",
                &CustomerInput {
                    name: "Walk-in".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.bookings()
            .create(
                "system",
                &BookingInput {
                    customer_id: customer.id,
                    items: vec![BookingItemInput {
                        product_id: product_id.to_string(),
                        quantity,
                    }],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_computes_available() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(
                "system",
                &ProductInput {
                    bad_stock: 4,
                    dead_stock: 6,
                    ..input("GT-100", 120)
                },
            )
            .await
            .unwrap();

        assert_eq!(product.booked_stock, 0);
        assert_eq!(product.available_stock, 110);

        book(&db, &product.id, 30).await;
        let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(product.booked_stock, 30);
        assert_eq!(product.available_stock, 80);
    }

    #[tokio::test]
    async fn test_duplicate_model_no() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create("system", &input("GT-1", 1)).await.unwrap();

        let err = db.products().create("system", &input("GT-1", 2)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::UniqueViolation { ref field, ref value } if field == "model_no" && value == "GT-1"
        ));
    }

    #[tokio::test]
    async fn test_damaged_cannot_exceed_total() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .products()
            .create(
                "system",
                &ProductInput {
                    bad_stock: 3,
                    dead_stock: 3,
                    ..input("GT-2", 5)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Rejected(CoreError::Validation(ValidationError::DamagedExceedsTotal { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .products()
            .create(
                "system",
                &ProductInput {
                    category_id: Some("4b0e8a4e-0000-4000-8000-000000000000".to_string()),
                    ..input("GT-3", 5)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Category"));
    }

    #[tokio::test]
    async fn test_update_cannot_drop_below_booked() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create("system", &input("GT-4", 10)).await.unwrap();
        book(&db, &product.id, 8).await;

        let err = db
            .products()
            .update(
                "system",
                &product.id,
                &ProductInput {
                    bad_stock: 3,
                    ..input("GT-4", 10)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Rejected(CoreError::StockBelowReserved {
                sellable: 7,
                booked: 8,
                ..
            })
        ));

        // Exactly covering the bookings is fine
        let updated = db
            .products()
            .update(
                "system",
                &product.id,
                &ProductInput {
                    bad_stock: 2,
                    ..input("GT-4", 10)
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.available_stock, 0);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_bookings() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let booked = db.products().create("system", &input("GT-5", 10)).await.unwrap();
        let spare = db.products().create("system", &input("GT-6", 10)).await.unwrap();
        book(&db, &booked.id, 1).await;

        let err = db.products().delete("system", &booked.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rejected(CoreError::ProductHasBookings { count: 1, .. })
        ));

        db.products().delete("system", &spare.id).await.unwrap();
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_and_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .create(
                "system",
                &ProductInput {
                    name: "Wash Basin".to_string(),
                    ..input("WB-1", 50)
                },
            )
            .await
            .unwrap();
        db.products()
            .create(
                "system",
                &ProductInput {
                    name: "Basin Mixer".to_string(),
                    ..input("MX-1", 3)
                },
            )
            .await
            .unwrap();
        db.products().create("system", &input("TP-1", 0)).await.unwrap();

        assert_eq!(db.products().search("basin", 5).await.unwrap().len(), 2);
        assert_eq!(db.products().search("mx-", 5).await.unwrap().len(), 1);
        assert_eq!(db.products().search("", 2).await.unwrap().len(), 2);
        assert!(db.products().search("100%", 5).await.unwrap().is_empty());

        let low = db
            .products()
            .query(&ProductQuery {
                stock: StockFilter::Low,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].model_no, "MX-1");
    }

    #[tokio::test]
    async fn test_upsert_by_model_no() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db
            .products()
            .upsert_by_model_no("system", &input("UP-1", 5))
            .await
            .unwrap();
        let updated = db
            .products()
            .upsert_by_model_no("system", &input("UP-1", 9))
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.total_stock, 9);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_resolves_names_and_upserts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.manufacturers()
            .create(
                "system",
                &ManufacturerInput {
                    factory_name: "Sonex".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.categories()
            .create(
                "system",
                &CategoryInput {
                    name: "Basins".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
        db.products().create("system", &input("SX-1", 1)).await.unwrap();

        let csv = "Model Number,Name,Manufacturer,Category,Total Stock\n\
                   SX-1,Oval basin,sonex,basins,40\n\
                   SX-2,Round basin,Sonex,,15\n";
        let rows = parse_product_csv(csv.as_bytes()).unwrap();

        let summary = db.products().import("system", rows).await.unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);

        let sx1 = db.products().get_by_model_no("SX-1").await.unwrap().unwrap();
        assert_eq!(sx1.total_stock, 40);
        assert_eq!(sx1.name, "Oval basin");
        assert!(sx1.manufacturer_id.is_some());
        assert!(sx1.category_id.is_some());

        let feed = db.activity().recent(1).await.unwrap();
        assert_eq!(feed[0].description, "Imported 2 products via CSV");
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let csv = "model_no,name,manufacturer,total_stock\n\
                   OK-1,Fine row,,5\n\
                   OK-2,Bad reference,Ghost Works,5\n";
        let rows = parse_product_csv(csv.as_bytes()).unwrap();

        let err = db.products().import("system", rows).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rejected(CoreError::Import { row: 2, .. })
        ));
        assert_eq!(db.products().count().await.unwrap(), 0);
        assert_eq!(db.activity().count().await.unwrap(), 0);
    }
}
