//! # Category Repository
//!
//! Category names are unique, case-insensitively. A category cannot be
//! deleted while products use it.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::activity::record;
use super::{commit, new_id, non_blank, snapshot, RepoContext};
use crate::error::{DbError, DbResult};
use stockbook_core::validation::validate_category_input;
use stockbook_core::{ActionType, ActivityEntry, Category, CategoryInput, CoreError, EntityType};

const CATEGORY_SELECT: &str =
    "SELECT id, name, description, created_at, updated_at FROM categories";

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    ctx: RepoContext,
}

impl CategoryRepository {
    pub fn new(ctx: RepoContext) -> Self {
        CategoryRepository { ctx }
    }

    /// All categories, by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("{CATEGORY_SELECT} ORDER BY name COLLATE NOCASE");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.ctx.pool)
            .await?;
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let mut conn = self.ctx.pool.acquire().await?;
        fetch_category(&mut conn, id).await
    }

    pub async fn create(&self, actor: &str, input: &CategoryInput) -> DbResult<Category> {
        validate_category_input(input)?;
        let name = input.name.trim();
        debug!(name = %name, "Creating category");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        ensure_name_free(&mut tx, name, None).await?;

        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(non_blank(&input.description))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let category = fetch_category(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", &id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::created(
                EntityType::Category,
                &category.id,
                format!("Created category {}", category.name),
                snapshot(&category)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx
            .publish(EntityType::Category, ActionType::Create, Some(&category.id));
        Ok(category)
    }

    pub async fn update(&self, actor: &str, id: &str, input: &CategoryInput) -> DbResult<Category> {
        validate_category_input(input)?;
        let name = input.name.trim();
        debug!(id = %id, "Updating category");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_category(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;
        ensure_name_free(&mut tx, name, Some(id)).await?;

        sqlx::query("UPDATE categories SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(name)
            .bind(non_blank(&input.description))
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let after = fetch_category(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::updated(
                EntityType::Category,
                id,
                format!("Updated category {}", after.name),
                snapshot(&before)?,
                snapshot(&after)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Category, ActionType::Update, Some(id));
        Ok(after)
    }

    /// Deletes a category that no product uses.
    ///
    /// ## Returns
    /// * `Err(Rejected(CategoryInUse))` - Products still reference it
    pub async fn delete(&self, actor: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting category");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_category(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;

        let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if in_use > 0 {
            return Err(CoreError::CategoryInUse { count: in_use }.into());
        }

        sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::deleted(
                EntityType::Category,
                id,
                format!("Deleted category {}", before.name),
                snapshot(&before)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Category, ActionType::Delete, Some(id));
        Ok(())
    }
}

pub(crate) async fn fetch_category(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Category>> {
    let sql = format!("{CATEGORY_SELECT} WHERE id = ?1");
    let category = sqlx::query_as::<_, Category>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(category)
}

async fn ensure_name_free(
    conn: &mut SqliteConnection,
    name: &str,
    except_id: Option<&str>,
) -> DbResult<()> {
    let taken: Option<String> = sqlx::query_scalar(
        "SELECT id FROM categories WHERE name = ?1 COLLATE NOCASE AND id IS NOT ?2",
    )
    .bind(name)
    .bind(except_id)
    .fetch_optional(&mut *conn)
    .await?;

    match taken {
        Some(_) => Err(DbError::duplicate("name", name)),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use stockbook_core::{CategoryInput, CoreError, ProductInput};

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_names_are_unique_ignoring_case() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.categories().create("system", &input("Basins")).await.unwrap();

        let err = db
            .categories()
            .create("system", &input("  basins "))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for name in ["Taps", "basins", "Mirrors"] {
            db.categories().create("system", &input(name)).await.unwrap();
        }

        let names: Vec<String> = db
            .categories()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["basins", "Mirrors", "Taps"]);
    }

    #[tokio::test]
    async fn test_delete_blocked_while_in_use() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let taps = db.categories().create("system", &input("Taps")).await.unwrap();

        for model_no in ["TP-1", "TP-2"] {
            db.products()
                .create(
                    "system",
                    &ProductInput {
                        model_no: model_no.to_string(),
                        name: "Mixer".to_string(),
                        category_id: Some(taps.id.clone()),
                        total_stock: 5,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let err = db.categories().delete("system", &taps.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rejected(CoreError::CategoryInUse { count: 2 })
        ));
        assert_eq!(
            err.to_string(),
            "Cannot delete category. 2 products are using this category."
        );
        assert!(db.categories().get_by_id(&taps.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_unused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let spare = db.categories().create("system", &input("Spare")).await.unwrap();

        db.categories().delete("system", &spare.id).await.unwrap();
        assert!(db.categories().get_by_id(&spare.id).await.unwrap().is_none());

        let err = db.categories().delete("system", &spare.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
