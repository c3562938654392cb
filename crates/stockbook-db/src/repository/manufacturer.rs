//! # Manufacturer Repository
//!
//! Deleting a manufacturer keeps its products: their `manufacturer_id` is
//! cleared by the foreign key (`ON DELETE SET NULL`).

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::activity::record;
use super::category::CategoryRepository;
use super::product::ProductRepository;
use super::{commit, new_id, non_blank, snapshot, RepoContext};
use crate::error::{DbError, DbResult};
use stockbook_core::report::ManufacturerOverview;
use stockbook_core::validation::validate_manufacturer_input;
use stockbook_core::{ActionType, ActivityEntry, EntityType, Manufacturer, ManufacturerInput};

const MANUFACTURER_SELECT: &str = r#"
    SELECT id, factory_name, contact_person, contact_info, notes, created_at, updated_at
    FROM manufacturers
"#;

/// Repository for manufacturer database operations.
#[derive(Debug, Clone)]
pub struct ManufacturerRepository {
    ctx: RepoContext,
}

impl ManufacturerRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ManufacturerRepository { ctx }
    }

    /// All manufacturers, by factory name.
    pub async fn list(&self) -> DbResult<Vec<Manufacturer>> {
        let sql = format!("{MANUFACTURER_SELECT} ORDER BY factory_name COLLATE NOCASE");
        let manufacturers = sqlx::query_as::<_, Manufacturer>(&sql)
            .fetch_all(&self.ctx.pool)
            .await?;
        Ok(manufacturers)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Manufacturer>> {
        let mut conn = self.ctx.pool.acquire().await?;
        fetch_manufacturer(&mut conn, id).await
    }

    /// Looks up by exact id, then by factory name ignoring case.
    ///
    /// Used to resolve the manufacturer cell of an imported CSV row.
    pub async fn find_by_name_or_id(&self, value: &str) -> DbResult<Option<Manufacturer>> {
        let mut conn = self.ctx.pool.acquire().await?;
        resolve_manufacturer(&mut conn, value).await
    }

    pub async fn create(&self, actor: &str, input: &ManufacturerInput) -> DbResult<Manufacturer> {
        validate_manufacturer_input(input)?;
        debug!(factory_name = %input.factory_name, "Creating manufacturer");

        let (_guard, mut tx) = self.ctx.begin_write().await?;

        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO manufacturers (
                id, factory_name, contact_person, contact_info, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(input.factory_name.trim())
        .bind(non_blank(&input.contact_person))
        .bind(non_blank(&input.contact_info))
        .bind(non_blank(&input.notes))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let manufacturer = fetch_manufacturer(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Manufacturer", &id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::created(
                EntityType::Manufacturer,
                &manufacturer.id,
                format!("Created manufacturer {}", manufacturer.factory_name),
                snapshot(&manufacturer)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(
            EntityType::Manufacturer,
            ActionType::Create,
            Some(&manufacturer.id),
        );
        Ok(manufacturer)
    }

    pub async fn update(
        &self,
        actor: &str,
        id: &str,
        input: &ManufacturerInput,
    ) -> DbResult<Manufacturer> {
        validate_manufacturer_input(input)?;
        debug!(id = %id, "Updating manufacturer");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_manufacturer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Manufacturer", id))?;

        sqlx::query(
            r#"
            UPDATE manufacturers SET
                factory_name = ?2,
                contact_person = ?3,
                contact_info = ?4,
                notes = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.factory_name.trim())
        .bind(non_blank(&input.contact_person))
        .bind(non_blank(&input.contact_info))
        .bind(non_blank(&input.notes))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let after = fetch_manufacturer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Manufacturer", id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::updated(
                EntityType::Manufacturer,
                id,
                format!("Updated manufacturer {}", after.factory_name),
                snapshot(&before)?,
                snapshot(&after)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx
            .publish(EntityType::Manufacturer, ActionType::Update, Some(id));
        Ok(after)
    }

    /// Deletes a manufacturer, unlinking its products.
    ///
    /// ## Returns
    /// Number of products whose manufacturer was cleared.
    pub async fn delete(&self, actor: &str, id: &str) -> DbResult<i64> {
        debug!(id = %id, "Deleting manufacturer");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_manufacturer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Manufacturer", id))?;

        let unlinked: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE manufacturer_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM manufacturers WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::deleted(
                EntityType::Manufacturer,
                id,
                format!(
                    "Deleted manufacturer {} ({} products unlinked)",
                    before.factory_name, unlinked
                ),
                snapshot(&before)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx
            .publish(EntityType::Manufacturer, ActionType::Delete, Some(id));
        if unlinked > 0 {
            self.ctx.publish(EntityType::Product, ActionType::Update, None);
        }
        Ok(unlinked)
    }

    /// A manufacturer with its products and per-category counts.
    pub async fn with_products(&self, id: &str) -> DbResult<ManufacturerOverview> {
        let manufacturer = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Manufacturer", id))?;

        let products = ProductRepository::new(self.ctx.clone())
            .list_by_manufacturer(id)
            .await?;
        let categories = CategoryRepository::new(self.ctx.clone()).list().await?;

        Ok(ManufacturerOverview::build(manufacturer, products, &categories))
    }
}

pub(crate) async fn fetch_manufacturer(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Manufacturer>> {
    let sql = format!("{MANUFACTURER_SELECT} WHERE id = ?1");
    let manufacturer = sqlx::query_as::<_, Manufacturer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(manufacturer)
}

/// Id first, then the first factory name matching ignoring case.
pub(crate) async fn resolve_manufacturer(
    conn: &mut SqliteConnection,
    value: &str,
) -> DbResult<Option<Manufacturer>> {
    let value = value.trim();
    if let Some(found) = fetch_manufacturer(conn, value).await? {
        return Ok(Some(found));
    }

    let sql = format!(
        "{MANUFACTURER_SELECT} WHERE factory_name = ?1 COLLATE NOCASE ORDER BY created_at LIMIT 1"
    );
    let manufacturer = sqlx::query_as::<_, Manufacturer>(&sql)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(manufacturer)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use stockbook_core::{CategoryInput, ManufacturerInput, ProductInput};

    fn factory(name: &str) -> ManufacturerInput {
        ManufacturerInput {
            factory_name: name.to_string(),
            contact_person: Some("Imran".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_by_name_or_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sonex = db
            .manufacturers()
            .create("system", &factory("Sonex Ceramics"))
            .await
            .unwrap();

        let by_id = db.manufacturers().find_by_name_or_id(&sonex.id).await.unwrap();
        let by_name = db
            .manufacturers()
            .find_by_name_or_id("sonex ceramics")
            .await
            .unwrap();
        assert_eq!(by_id.unwrap().id, sonex.id);
        assert_eq!(by_name.unwrap().id, sonex.id);
        assert!(db
            .manufacturers()
            .find_by_name_or_id("Nobody")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_unlinks_products() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sonex = db
            .manufacturers()
            .create("system", &factory("Sonex"))
            .await
            .unwrap();
        let product = db
            .products()
            .create(
                "system",
                &ProductInput {
                    model_no: "SX-10".to_string(),
                    name: "Wash basin".to_string(),
                    manufacturer_id: Some(sonex.id.clone()),
                    total_stock: 4,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let unlinked = db.manufacturers().delete("system", &sonex.id).await.unwrap();
        assert_eq!(unlinked, 1);

        let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert!(product.manufacturer_id.is_none());
    }

    #[tokio::test]
    async fn test_with_products_counts_categories() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sonex = db
            .manufacturers()
            .create("system", &factory("Sonex"))
            .await
            .unwrap();
        let basins = db
            .categories()
            .create(
                "system",
                &CategoryInput {
                    name: "Basins".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let products = [
            ("SX-1", Some(basins.id.clone()), 20),
            ("SX-2", Some(basins.id.clone()), 5),
            ("SX-3", None, 0),
        ];
        for (model_no, category_id, total_stock) in products {
            db.products()
                .create(
                    "system",
                    &ProductInput {
                        model_no: model_no.to_string(),
                        name: format!("Item {model_no}"),
                        manufacturer_id: Some(sonex.id.clone()),
                        category_id,
                        total_stock,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let overview = db.manufacturers().with_products(&sonex.id).await.unwrap();
        assert_eq!(overview.products.len(), 3);
        assert_eq!(overview.total_stock, 25);
        assert_eq!(overview.category_counts[0].name, "Basins");
        assert_eq!(overview.category_counts[0].count, 2);
        assert_eq!(overview.category_counts[1].name, "Uncategorized");
        assert_eq!(overview.out_of_stock, 1);
        assert_eq!(overview.low_stock, 1);
    }
}
