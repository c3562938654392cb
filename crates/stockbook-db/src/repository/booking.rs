//! # Booking Repository
//!
//! Bookings reserve stock. The overbooking check runs inside the write
//! transaction, against the state the booking is committed on.
//!
//! ## Create / Edit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Booking Write                                     │
//! │                                                                         │
//! │  validate_booking_input()                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  write gate + BEGIN                                                     │
//! │       │                                                                 │
//! │       ├── edit? load old booking                                       │
//! │       │      prior = its items if its status reserves stock            │
//! │       │                                                                 │
//! │       ├── load every referenced product (current available)            │
//! │       │                                                                 │
//! │       ├── status != cancelled?                                         │
//! │       │      check_overbooking(lines, products, prior)                 │
//! │       │      └── Err(Overbooked{all offenders}) → ROLLBACK             │
//! │       │                                                                 │
//! │       ├── write header, replace items (duplicate lines merged)         │
//! │       └── activity entry                                               │
//! │  COMMIT → publish booking + product changes                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::activity::record;
use super::customer::fetch_customer;
use super::product::fetch_products_by_ids;
use super::{commit, new_id, non_blank, snapshot, RepoContext};
use crate::error::{DbError, DbResult};
use stockbook_core::report::{group_by_customer, CustomerBookings};
use stockbook_core::stock::{check_overbooking, merge_lines, reserved_by_product};
use stockbook_core::validation::validate_booking_input;
use stockbook_core::{
    ActionType, ActivityEntry, Booking, BookingInput, BookingItem, BookingStatus, CoreError,
    EntityType,
};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    customer_id: String,
    customer_name: String,
    status: BookingStatus,
    total_amount_cents: i64,
    booking_date: NaiveDate,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, items: Vec<BookingItem>) -> Booking {
        Booking {
            id: self.id,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            status: self.status,
            total_amount_cents: self.total_amount_cents,
            booking_date: self.booking_date,
            notes: self.notes,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const BOOKING_SELECT: &str = r#"
    SELECT
        b.id,
        b.customer_id,
        c.name AS customer_name,
        b.status,
        b.total_amount_cents,
        b.booking_date,
        b.notes,
        b.created_at,
        b.updated_at
    FROM bookings b
    JOIN customers c ON c.id = b.customer_id
"#;

const ITEM_SELECT: &str = r#"
    SELECT
        bi.id,
        bi.booking_id,
        bi.product_id,
        p.model_no,
        p.name AS product_name,
        bi.quantity,
        bi.created_at
    FROM booking_items bi
    JOIN products p ON p.id = bi.product_id
"#;

const NEWEST_FIRST: &str = "ORDER BY b.booking_date DESC, b.created_at DESC";

// =============================================================================
// Repository
// =============================================================================

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    ctx: RepoContext,
}

impl BookingRepository {
    pub fn new(ctx: RepoContext) -> Self {
        BookingRepository { ctx }
    }

    /// All bookings with their items, newest booking date first.
    pub async fn list(&self) -> DbResult<Vec<Booking>> {
        let sql = format!("{BOOKING_SELECT} {NEWEST_FIRST}");
        let rows: Vec<BookingRow> = sqlx::query_as(&sql).fetch_all(&self.ctx.pool).await?;

        let item_sql = format!("{ITEM_SELECT} ORDER BY bi.created_at, bi.rowid");
        let items: Vec<BookingItem> = sqlx::query_as(&item_sql)
            .fetch_all(&self.ctx.pool)
            .await?;

        Ok(attach_items(rows, items))
    }

    /// One customer's bookings, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Booking>> {
        let sql = format!("{BOOKING_SELECT} WHERE b.customer_id = ?1 {NEWEST_FIRST}");
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(customer_id)
            .fetch_all(&self.ctx.pool)
            .await?;

        let item_sql = format!(
            "{ITEM_SELECT} JOIN bookings b ON b.id = bi.booking_id \
             WHERE b.customer_id = ?1 ORDER BY bi.created_at, bi.rowid"
        );
        let items: Vec<BookingItem> = sqlx::query_as(&item_sql)
            .bind(customer_id)
            .fetch_all(&self.ctx.pool)
            .await?;

        Ok(attach_items(rows, items))
    }

    /// Bookings grouped per customer with amount and quantity totals.
    pub async fn grouped_by_customer(&self) -> DbResult<Vec<CustomerBookings>> {
        Ok(group_by_customer(self.list().await?))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        let mut conn = self.ctx.pool.acquire().await?;
        fetch_booking(&mut conn, id).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.ctx.pool)
            .await?;
        Ok(count)
    }

    /// Creates a booking if every line fits the available stock.
    ///
    /// ## Returns
    /// * `Err(Rejected(Overbooked))` - Lists every product that does not fit;
    ///   nothing is written
    /// * `Err(NotFound)` - Customer or product does not exist
    pub async fn create(&self, actor: &str, input: &BookingInput) -> DbResult<Booking> {
        validate_booking_input(input)?;
        debug!(customer_id = %input.customer_id, lines = input.items.len(), "Creating booking");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        ensure_customer(&mut tx, &input.customer_id).await?;
        check_stock(&mut tx, input, &HashMap::new()).await?;

        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, customer_id, status, total_amount_cents, booking_date, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&input.customer_id)
        .bind(input.status)
        .bind(input.total_amount_cents)
        .bind(booking_date(input))
        .bind(non_blank(&input.notes))
        .bind(now)
        .execute(&mut *tx)
        .await?;
        insert_items(&mut tx, &id, input).await?;

        let booking = fetch_booking(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", &id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::created(
                EntityType::Booking,
                &booking.id,
                format!(
                    "Created booking for {} ({} units)",
                    booking.customer_name,
                    booking.total_quantity()
                ),
                snapshot(&booking)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx
            .publish(EntityType::Booking, ActionType::Create, Some(&booking.id));
        self.publish_products(affected_products(&[], &booking.items));
        Ok(booking)
    }

    /// Replaces a booking's header and lines.
    ///
    /// The booking's own current reservation counts toward the allowance of
    /// each of its products, so re-saving an unchanged booking always works.
    pub async fn update(&self, actor: &str, id: &str, input: &BookingInput) -> DbResult<Booking> {
        validate_booking_input(input)?;
        debug!(id = %id, lines = input.items.len(), "Updating booking");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_booking(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", id))?;
        ensure_customer(&mut tx, &input.customer_id).await?;

        let prior = if before.status.reserves_stock() {
            reserved_by_product(&before.items)
        } else {
            HashMap::new()
        };
        check_stock(&mut tx, input, &prior).await?;

        sqlx::query(
            r#"
            UPDATE bookings SET
                customer_id = ?2,
                status = ?3,
                total_amount_cents = ?4,
                booking_date = ?5,
                notes = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.customer_id)
        .bind(input.status)
        .bind(input.total_amount_cents)
        .bind(input.booking_date.unwrap_or(before.booking_date))
        .bind(non_blank(&input.notes))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM booking_items WHERE booking_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, input).await?;

        let after = fetch_booking(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", id))?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::updated(
                EntityType::Booking,
                id,
                format!("Updated booking for {}", after.customer_name),
                snapshot(&before)?,
                snapshot(&after)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Booking, ActionType::Update, Some(id));
        self.publish_products(affected_products(&before.items, &after.items));
        Ok(after)
    }

    /// Deletes a booking and its items, releasing the reservation.
    pub async fn delete(&self, actor: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting booking");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_booking(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", id))?;

        // booking_items go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM bookings WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::deleted(
                EntityType::Booking,
                id,
                format!("Deleted booking for {}", before.customer_name),
                snapshot(&before)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::Booking, ActionType::Delete, Some(id));
        self.publish_products(affected_products(&before.items, &[]));
        Ok(())
    }

    fn publish_products(&self, product_ids: BTreeSet<String>) {
        for product_id in product_ids {
            self.ctx
                .publish(EntityType::Product, ActionType::Update, Some(&product_id));
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_booking(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Booking>> {
    let sql = format!("{BOOKING_SELECT} WHERE b.id = ?1");
    let Some(row) = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let item_sql = format!("{ITEM_SELECT} WHERE bi.booking_id = ?1 ORDER BY bi.created_at, bi.rowid");
    let items: Vec<BookingItem> = sqlx::query_as(&item_sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Some(row.into_booking(items)))
}

fn attach_items(rows: Vec<BookingRow>, items: Vec<BookingItem>) -> Vec<Booking> {
    let mut by_booking: HashMap<String, Vec<BookingItem>> = HashMap::new();
    for item in items {
        by_booking.entry(item.booking_id.clone()).or_default().push(item);
    }

    rows.into_iter()
        .map(|row| {
            let items = by_booking.remove(&row.id).unwrap_or_default();
            row.into_booking(items)
        })
        .collect()
}

async fn ensure_customer(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<()> {
    match fetch_customer(conn, customer_id).await? {
        Some(_) => Ok(()),
        None => Err(DbError::not_found("Customer", customer_id)),
    }
}

/// Loads the referenced products and applies the overbooking rule.
///
/// A cancelled booking reserves nothing, so only existence is checked.
async fn check_stock(
    conn: &mut SqliteConnection,
    input: &BookingInput,
    prior: &HashMap<String, i64>,
) -> DbResult<()> {
    let ids: Vec<String> = input.items.iter().map(|i| i.product_id.clone()).collect();
    let products = fetch_products_by_ids(conn, &ids).await?;

    if input.status.reserves_stock() {
        return check_overbooking(&input.items, &products, prior).map_err(|e| match e {
            CoreError::ProductNotFound(id) => DbError::not_found("Product", id),
            other => other.into(),
        });
    }

    match ids.into_iter().find(|id| !products.iter().any(|p| &p.id == id)) {
        Some(missing) => Err(DbError::not_found("Product", missing)),
        None => Ok(()),
    }
}

async fn insert_items(conn: &mut SqliteConnection, booking_id: &str, input: &BookingInput) -> DbResult<()> {
    let now = Utc::now();
    for (product_id, quantity) in merge_lines(&input.items) {
        sqlx::query(
            r#"
            INSERT INTO booking_items (id, booking_id, product_id, quantity, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(new_id())
        .bind(booking_id)
        .bind(&product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn booking_date(input: &BookingInput) -> NaiveDate {
    input
        .booking_date
        .unwrap_or_else(|| Utc::now().date_naive())
}

fn affected_products(before: &[BookingItem], after: &[BookingItem]) -> BTreeSet<String> {
    before
        .iter()
        .chain(after)
        .map(|item| item.product_id.clone())
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
