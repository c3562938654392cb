//! # Customer Repository
//!
//! A customer with bookings cannot be deleted; their bookings would lose
//! their owner.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::activity::record;
use super::{commit, contains_pattern, new_id, non_blank, snapshot, RepoContext};
use crate::error::{DbError, DbResult};
use stockbook_core::validation::{validate_customer_input, validate_search_query};
use stockbook_core::{ActionType, ActivityEntry, CoreError, Customer, CustomerInput, EntityType};

const CUSTOMER_SELECT: &str =
    "SELECT id, name, email, phone, address, created_at, updated_at FROM customers";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    ctx: RepoContext,
}

impl CustomerRepository {
    pub fn new(ctx: RepoContext) -> Self {
        CustomerRepository { ctx }
    }

    /// All customers, by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("{CUSTOMER_SELECT} ORDER BY name COLLATE NOCASE");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(&self.ctx.pool)
            .await?;
        Ok(customers)
    }

    /// Customers whose name, email, or phone contains `query`.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            let sql = format!("{CUSTOMER_SELECT} ORDER BY name COLLATE NOCASE LIMIT ?1");
            return Ok(sqlx::query_as::<_, Customer>(&sql)
                .bind(limit)
                .fetch_all(&self.ctx.pool)
                .await?);
        }

        let sql = format!(
            "{CUSTOMER_SELECT} WHERE name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\' \
             OR phone LIKE ?1 ESCAPE '\\' ORDER BY name COLLATE NOCASE LIMIT ?2"
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(contains_pattern(query))
            .bind(limit)
            .fetch_all(&self.ctx.pool)
            .await?;
        Ok(customers)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.ctx.pool.acquire().await?;
        fetch_customer(&mut conn, id).await
    }

    pub async fn create(&self, actor: &str, input: &CustomerInput) -> DbResult<Customer> {
        validate_customer_input(input)?;
        debug!(name = %input.name, "Creating customer");

        let (_guard, mut tx) = self.ctx.begin_write().await?;

        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, address, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(non_blank(&input.email))
        .bind(non_blank(&input.phone))
        .bind(non_blank(&input.address))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let customer = fetch_customer(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", &id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::created(
                EntityType::Customer,
                &customer.id,
                format!("Created customer {}", customer.name),
                snapshot(&customer)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx
            .publish(EntityType::Customer, ActionType::Create, Some(&customer.id));
        Ok(customer)
    }

    pub async fn update(&self, actor: &str, id: &str, input: &CustomerInput) -> DbResult<Customer> {
        validate_customer_input(input)?;
        debug!(id = %id, "Updating customer");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_customer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2,
                email = ?3,
                phone = ?4,
                address = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(non_blank(&input.email))
        .bind(non_blank(&input.phone))
        .bind(non_blank(&input.address))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let after = fetch_customer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::updated(
                EntityType::Customer,
                id,
                format!("Updated customer {}", after.name),
                snapshot(&before)?,
                snapshot(&after)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Customer, ActionType::Update, Some(id));
        Ok(after)
    }

    /// Deletes a customer with no bookings.
    ///
    /// ## Returns
    /// * `Err(Rejected(CustomerHasBookings))` - Bookings still reference them
    pub async fn delete(&self, actor: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_customer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE customer_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if bookings > 0 {
            return Err(CoreError::CustomerHasBookings { count: bookings }.into());
        }

        sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::deleted(
                EntityType::Customer,
                id,
                format!("Deleted customer {}", before.name),
                snapshot(&before)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Customer, ActionType::Delete, Some(id));
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.ctx.pool)
            .await?;
        Ok(count)
    }
}

pub(crate) async fn fetch_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let sql = format!("{CUSTOMER_SELECT} WHERE id = ?1");
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(customer)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use stockbook_core::{CoreError, CustomerInput, ValidationError};

    fn input(name: &str, email: Option<&str>) -> CustomerInput {
        CustomerInput {
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: Some("  ".to_string()),
            address: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customers = db.customers();

        let ayesha = customers
            .create("system", &input("Ayesha Khan", Some("ayesha@example.com")))
            .await
            .unwrap();
        // Blank optional fields are stored as NULL
        assert!(ayesha.phone.is_none());

        let updated = customers
            .update("system", &ayesha.id, &input("Ayesha K.", None))
            .await
            .unwrap();
        assert_eq!(updated.name, "Ayesha K.");
        assert!(updated.email.is_none());
        assert_eq!(updated.created_at, ayesha.created_at);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .customers()
            .create("system", &input("Bilal", Some("not-an-email")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Rejected(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
        assert_eq!(db.customers().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_matches_name_and_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers()
            .create("system", &input("Ayesha Khan", Some("ayesha@example.com")))
            .await
            .unwrap();
        db.customers()
            .create("system", &input("Bilal Ahmed", Some("bilal@shop.pk")))
            .await
            .unwrap();

        assert_eq!(db.customers().search("khan", 10).await.unwrap().len(), 1);
        assert_eq!(db.customers().search("shop.pk", 10).await.unwrap().len(), 1);
        assert_eq!(db.customers().search("", 10).await.unwrap().len(), 2);
        assert!(db.customers().search("zzz", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .customers()
            .update("system", "0b7f3c1e-0000-4000-8000-000000000000", &input("X", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
