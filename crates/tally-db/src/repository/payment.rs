//! # Payment Repository
//!
//! Checkout writes the first payment inside the sale transaction (see
//! [`super::sale`]). A sale tendered only in part at the register keeps an
//! outstanding balance, which `POST /api/payments` settles in one or more
//! further payments.
//!
//! ```text
//! balance = sales.total_cents - SUM(payments.amount_paid_cents)
//!
//! balance == 0          ──► SaleAlreadyPaid       (CONFLICT)
//! amount  >  balance    ──► PaymentExceedsBalance (VALIDATION_ERROR)
//! otherwise             ──► INSERT
//! ```

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, now};
use tally_core::validation::validate_payment_amount;
use tally_core::{CoreError, Page, PageRequest, Payment, PaymentMethod};

const PAYMENT_COLUMNS: &str =
    "id, sale_id, amount_paid_cents, payment_method, transaction_id, created_at";

/// A payment recorded by hand against an existing sale.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub sale_id: String,
    pub amount_paid_cents: i64,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment against the outstanding balance of a sale.
    pub async fn insert(&self, new: &NewPayment) -> DbResult<Payment> {
        validate_payment_amount(new.amount_paid_cents).map_err(CoreError::from)?;

        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT s.total_cents - COALESCE(
                (SELECT SUM(p.amount_paid_cents) FROM payments p WHERE p.sale_id = s.id), 0)
            FROM sales s
            WHERE s.id = ?1
            "#,
        )
        .bind(&new.sale_id)
        .fetch_optional(&mut *tx)
        .await?;

        match balance {
            None => return Err(CoreError::SaleNotFound(new.sale_id.clone()).into()),
            Some(balance) if balance <= 0 => {
                return Err(CoreError::SaleAlreadyPaid(new.sale_id.clone()).into())
            }
            Some(balance) if new.amount_paid_cents > balance => {
                return Err(CoreError::PaymentExceedsBalance {
                    balance,
                    requested: new.amount_paid_cents,
                }
                .into())
            }
            Some(_) => {}
        }

        let payment = Payment {
            id: generate_id(),
            sale_id: new.sale_id.clone(),
            amount_paid_cents: new.amount_paid_cents,
            payment_method: new.payment_method,
            transaction_id: new
                .transaction_id
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            created_at: now(),
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

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(payment_id = %payment.id, sale_id = %payment.sale_id, "Payment recorded");
        Ok(payment)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE sale_id = ?1 ORDER BY created_at, id"
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    /// Payments newest first, optionally for one sale.
    pub async fn list(&self, sale_id: Option<&str>, page: PageRequest) -> DbResult<Page<Payment>> {
        let sql = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE (?1 IS NULL OR sale_id = ?1)
            ORDER BY created_at DESC, id
            LIMIT ?2 OFFSET ?3
            "#
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(sale_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE (?1 IS NULL OR sale_id = ?1)")
                .bind(sale_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(page.into_page(payments, total))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
