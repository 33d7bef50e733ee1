//! # Dashboard Repository
//!
//! Read-only aggregates, recomputed on every call. Nothing is cached.

use sqlx::SqlitePool;

use crate::error::DbResult;
use tally_core::{DashboardSummary, PaymentMethodBreakdown, TopProduct};

#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DashboardRepository { pool }
    }

    /// Product count, sale count and revenue (sum of sale totals).
    pub async fn summary(&self) -> DbResult<DashboardSummary> {
        let (total_products, total_sales, total_revenue_cents) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM products),
                    (SELECT COUNT(*) FROM sales),
                    (SELECT COALESCE(SUM(total_cents), 0) FROM sales)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardSummary {
            total_products,
            total_sales,
            total_revenue_cents,
        })
    }

    /// Sale count and revenue per payment method, largest first.
    pub async fn payment_methods(&self) -> DbResult<Vec<PaymentMethodBreakdown>> {
        let rows = sqlx::query_as::<_, PaymentMethodBreakdown>(
            r#"
            SELECT
                payment_method,
                COUNT(*) AS sale_count,
                COALESCE(SUM(total_cents), 0) AS total_cents
            FROM sales
            GROUP BY payment_method
            ORDER BY total_cents DESC, payment_method
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Best sellers by units sold. Deleted products keep their id with no name.
    pub async fn top_products(&self, limit: i64) -> DbResult<Vec<TopProduct>> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                sl.product_id,
                p.name AS name,
                SUM(sl.quantity) AS quantity_sold,
                SUM(sl.quantity * sl.unit_price_cents) AS revenue_cents
            FROM sale_lines sl
            LEFT JOIN products p ON p.id = sl.product_id
            GROUP BY sl.product_id
            ORDER BY quantity_sold DESC, revenue_cents DESC, sl.product_id
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::NewProduct;
    use crate::repository::sale::NewSale;
    use crate::{Database, DbConfig};
    use tally_core::{CartLine, PaymentMethod};

    async fn product(db: &Database, name: &str, price_cents: i64) -> String {
        db.products()
            .insert(&NewProduct {
                name: name.into(),
                description: None,
                price_cents,
                quantity: 100,
                category: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn sell(db: &Database, method: PaymentMethod, lines: &[(&str, i64)]) {
        db.sales()
            .checkout(&NewSale {
                cashier_id: None,
                lines: lines
                    .iter()
                    .map(|(id, quantity)| CartLine {
                        product_id: id.to_string(),
                        quantity: *quantity,
                    })
                    .collect(),
                payment_method: method,
                customer_name: None,
                customer_email: None,
                amount_paid_cents: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dash = db.dashboard();

        let summary = dash.summary().await.unwrap();
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.total_sales, 0);
        assert_eq!(summary.total_revenue_cents, 0);
        assert!(dash.payment_methods().await.unwrap().is_empty());
        assert!(dash.top_products(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aggregates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let widget = product(&db, "Widget", 1000).await;
        let gadget = product(&db, "Gadget", 250).await;

        sell(&db, PaymentMethod::Cash, &[(&widget, 1), (&gadget, 4)]).await;
        sell(&db, PaymentMethod::Card, &[(&widget, 2)]).await;
        sell(&db, PaymentMethod::Cash, &[(&gadget, 2)]).await;

        let summary = db.dashboard().summary().await.unwrap();
        assert_eq!(summary.total_products, 2);
        assert_eq!(summary.total_sales, 3);
        assert_eq!(summary.total_revenue_cents, 2000 + 2000 + 500);

        let methods = db.dashboard().payment_methods().await.unwrap();
        let cash = methods
            .iter()
            .find(|m| m.payment_method == PaymentMethod::Cash)
            .unwrap();
        assert_eq!(cash.sale_count, 2);
        assert_eq!(cash.total_cents, 2500);

        let top = db.dashboard().top_products(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name.as_deref(), Some("Gadget"));
        assert_eq!(top[0].quantity_sold, 6);
        assert_eq!(top[0].revenue_cents, 1500);

        // Deleted products still rank, without a name
        db.products().delete(&gadget).await.unwrap();
        let top = db.dashboard().top_products(5).await.unwrap();
        assert_eq!(top[0].product_id, gadget);
        assert_eq!(top[0].name, None);
    }
}
