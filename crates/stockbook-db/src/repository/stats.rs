//! # Stats Repository
//!
//! Dashboard headline numbers.

use tracing::debug;

use super::product::ProductRepository;
use super::RepoContext;
use crate::error::DbResult;
use stockbook_core::report::OverviewStats;

#[derive(Debug, Clone)]
pub struct StatsRepository {
    ctx: RepoContext,
}

impl StatsRepository {
    pub fn new(ctx: RepoContext) -> Self {
        StatsRepository { ctx }
    }

    /// Total stock, booking count, low-stock items, total available.
    pub async fn overview(&self) -> DbResult<OverviewStats> {
        let products = ProductRepository::new(self.ctx.clone()).list().await?;
        let total_bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.ctx.pool)
            .await?;

        let stats = OverviewStats::compute(&products, total_bookings);
        debug!(?stats, "Computed overview");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use stockbook_core::{BookingInput, BookingItemInput, CustomerInput, ProductInput};

    #[tokio::test]
    async fn test_overview() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let empty = db.stats().overview().await.unwrap();
        assert_eq!(empty.total_stock, 0);
        assert_eq!(empty.total_bookings, 0);

        let plenty = db
            .products()
            .create(
                "system",
                &ProductInput {
                    model_no: "A-1".to_string(),
                    name: "Plenty".to_string(),
                    total_stock: 100,
                    bad_stock: 5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        db.products()
            .create(
                "system",
                &ProductInput {
                    model_no: "A-2".to_string(),
                    name: "Scarce".to_string(),
                    total_stock: 9,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
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
                        product_id: plenty.id,
                        quantity: 15,
                    }],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stats = db.stats().overview().await.unwrap();
        assert_eq!(stats.total_stock, 109);
        assert_eq!(stats.total_bookings, 1);
        assert_eq!(stats.low_stock_items, 1);
        // (100 - 5 - 15) + 9
        assert_eq!(stats.total_available, 89);
    }
}
