//! # Sale Repository
//!
//! Checkout and sale lookup.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  begin_checkout(NewSale)                                                │
//! │       │                                                                 │
//! │       ├── validate_cart + customer fields      (no transaction yet)     │
//! │       │                                                                 │
//! │       ▼  BEGIN IMMEDIATE                                                │
//! │  load referenced products                                               │
//! │       │                                                                 │
//! │  plan_checkout  ── missing / short ──► Err (ROLLBACK, nothing written)  │
//! │       │                                                                 │
//! │  UPDATE products SET quantity = quantity - n                            │
//! │   WHERE id = ? AND quantity >= n  ── 0 rows ──► Err (ROLLBACK)          │
//! │       │                                                                 │
//! │  INSERT sales, sale_lines, payments                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PendingCheckout { tx, detail, payment }                                │
//! │       │                                                                 │
//! │       ├── caller renders + stores the receipt                           │
//! │       │                                                                 │
//! │       ├── commit()  ──► COMMIT                                          │
//! │       └── dropped   ──► ROLLBACK                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock can never go negative: the conditional decrement refuses to, and
//! the `CHECK (quantity >= 0)` constraint backs it up.

use std::collections::HashMap;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, now};
use tally_core::checkout::{plan_checkout, validate_cart, CartLine};
use tally_core::validation::{normalize_email, validate_customer_name};
use tally_core::{
    CoreError, Page, PageRequest, Payment, PaymentMethod, Product, Sale, SaleDetail,
    SaleLineDetail, ValidationError,
};

const SALE_COLUMNS: &str =
    "id, total_cents, payment_method, customer_name, customer_email, cashier_id, created_at";

/// A sale as submitted at the register.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub cashier_id: Option<String>,
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    /// Tendered at the register, `0..=total`. `None` pays the sale in full;
    /// anything less leaves a balance for `PaymentRepository::insert`.
    pub amount_paid_cents: Option<i64>,
}

/// A checkout whose writes are done but not yet committed.
///
/// Dropping it rolls everything back.
pub struct PendingCheckout {
    tx: Transaction<'static, Sqlite>,
    pub detail: SaleDetail,
    pub payment: Payment,
}

impl PendingCheckout {
    /// Commits the sale, its lines, its payment and the stock decrements.
    pub async fn commit(self) -> DbResult<(SaleDetail, Payment)> {
        let PendingCheckout {
            tx,
            detail,
            payment,
        } = self;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %detail.sale.id,
            total_cents = detail.sale.total_cents,
            lines = detail.lines.len(),
            "Sale committed"
        );
        Ok((detail, payment))
    }
}

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Runs every write of a checkout inside one transaction and hands back
    /// the uncommitted result.
    ///
    /// ## Errors
    /// - `Rejected(EmptyCart | CartTooLarge | Validation)` for malformed input
    /// - `Rejected(ProductNotFound)` for the first unknown product
    /// - `Rejected(InsufficientStock)` when stock would go negative
    pub async fn begin_checkout(&self, new: &NewSale) -> DbResult<PendingCheckout> {
        validate_cart(&new.lines)?;
        let customer_name = clean_optional(new.customer_name.as_deref());
        validate_customer_name(customer_name.as_deref()).map_err(CoreError::from)?;
        let customer_email = match clean_optional(new.customer_email.as_deref()) {
            Some(email) => Some(normalize_email(&email).map_err(CoreError::from)?),
            None => None,
        };

        // Write lock before the first read; a deferred transaction that
        // reads and then writes gets SQLITE_BUSY instead of waiting.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        // Load each referenced product once
        let mut products: HashMap<String, Product> = HashMap::new();
        for line in &new.lines {
            if products.contains_key(&line.product_id) {
                continue;
            }
            let sql = "SELECT id, name, description, price_cents, quantity, category, created_at, updated_at \
                       FROM products WHERE id = ?1";
            if let Some(product) = sqlx::query_as::<_, Product>(sql)
                .bind(&line.product_id)
                .fetch_optional(&mut *tx)
                .await?
            {
                products.insert(product.id.clone(), product);
            }
        }

        let plan = plan_checkout(&new.lines, |id| products.get(id))?;
        debug!(
            lines = plan.lines.len(),
            total_cents = plan.total.cents(),
            "Checkout planned"
        );

        let total_cents = plan.total.cents();
        let amount_paid_cents = match new.amount_paid_cents {
            None => total_cents,
            Some(amount) if (0..=total_cents).contains(&amount) => amount,
            Some(_) => {
                return Err(CoreError::from(ValidationError::OutOfRange {
                    field: "amount_paid_cents".to_string(),
                    min: 0,
                    max: total_cents,
                })
                .into())
            }
        };

        let now = now();

        for decrement in &plan.decrements {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET quantity = quantity - ?1, updated_at = ?2
                WHERE id = ?3 AND quantity >= ?1
                "#,
            )
            .bind(decrement.quantity)
            .bind(now)
            .bind(&decrement.product_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
                        .bind(&decrement.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                warn!(
                    product_id = %decrement.product_id,
                    requested = decrement.quantity,
                    "Stock changed during checkout"
                );
                return Err(match available {
                    Some(available) => decrement.shortfall(available),
                    None => CoreError::ProductNotFound(decrement.product_id.clone()),
                }
                .into());
            }
        }

        let sale_id = generate_id();

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, total_cents, payment_method, customer_name, customer_email, cashier_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&sale_id)
        .bind(plan.total.cents())
        .bind(new.payment_method)
        .bind(&customer_name)
        .bind(&customer_email)
        .bind(&new.cashier_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &plan.lines {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (sale_id, position, product_id, quantity, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&sale_id)
            .bind(line.position)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        let payment = Payment {
            id: generate_id(),
            sale_id: sale_id.clone(),
            amount_paid_cents,
            payment_method: new.payment_method,
            transaction_id: Some(generate_transaction_id()),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (id, sale_id, amount_paid_cents, payment_method, transaction_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.amount_paid_cents)
        .bind(payment.payment_method)
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let detail = load_detail(&mut tx, &sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &sale_id))?;

        Ok(PendingCheckout {
            tx,
            detail,
            payment,
        })
    }

    /// Convenience for callers with nothing to do between write and commit.
    pub async fn checkout(&self, new: &NewSale) -> DbResult<(SaleDetail, Payment)> {
        self.begin_checkout(new).await?.commit().await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// A sale with its lines and product names resolved.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, id).await
    }

    /// Sales, newest first, without lines.
    pub async fn list(&self, page: PageRequest) -> DbResult<Page<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2"
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let total = self.count().await?;
        Ok(page.into_page(sales, total))
    }

    /// Sales, newest first, each with its lines.
    pub async fn list_detailed(&self, page: PageRequest) -> DbResult<Page<SaleDetail>> {
        let sales = self.list(page).await?;

        let mut conn = self.pool.acquire().await?;
        let mut items = Vec::with_capacity(sales.items.len());
        for sale in sales.items {
            let lines = load_lines(&mut conn, &sale.id).await?;
            items.push(SaleDetail { sale, lines });
        }

        Ok(page.into_page(items, sales.total))
    }

    /// Deletes a sale with its lines and payments. Stock is not restored.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        info!(sale_id = %id, "Sale deleted");
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn load_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SaleDetail>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let Some(sale) = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let lines = load_lines(conn, id).await?;
    Ok(Some(SaleDetail { sale, lines }))
}

async fn load_lines(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleLineDetail>> {
    let lines = sqlx::query_as::<_, SaleLineDetail>(
        r#"
        SELECT
            sl.position,
            sl.product_id,
            p.name AS product_name,
            sl.quantity,
            sl.unit_price_cents,
            sl.quantity * sl.unit_price_cents AS line_total_cents
        FROM sale_lines sl
        LEFT JOIN products p ON p.id = sl.product_id
        WHERE sl.sale_id = ?1
        ORDER BY sl.position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reference recorded on checkout payments: `TXN-` + 32 hex digits.
pub fn generate_transaction_id() -> String {
    format!("TXN-{}", Uuid::new_v4().simple().to_string().to_uppercase())
}

// =============================================================================
// Unit Tests
// =============================================================================
