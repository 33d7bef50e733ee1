//! # Checkout
//!
//! Ties the database transaction to the receipt artifact so a sale either
//! exists with its PDF or not at all.
//!
//! ```text
//! begin_checkout ──► PendingCheckout (uncommitted)
//!      │
//!      ├── render_pdf ── Err ──► drop (ROLLBACK)
//!      ├── store.save ── Err ──► drop (ROLLBACK)
//!      │
//!      └── commit ── Err ──► remove artifact, ROLLBACK
//!            │
//!            ▼
//!       (SaleDetail, Payment)
//! ```

use tracing::{error, info};

use tally_core::{Payment, ReceiptDocument, SaleDetail};
use tally_db::NewSale;

use crate::error::ApiResult;
use crate::receipts::render_pdf;
use crate::AppState;

/// Records a sale, its payment, the stock decrements and the receipt.
pub async fn create_sale(state: &AppState, new: &NewSale) -> ApiResult<(SaleDetail, Payment)> {
    let pending = state.db.sales().begin_checkout(new).await?;

    let document = ReceiptDocument::from_sale(&pending.detail);
    let pdf = render_pdf(&document)?;
    let sale_id = pending.detail.sale.id.clone();
    state.receipts.save(&sale_id, &pdf).await?;

    match pending.commit().await {
        Ok((detail, payment)) => {
            info!(
                sale_id = %detail.sale.id,
                total_cents = detail.sale.total_cents,
                receipt_bytes = pdf.len(),
                "Checkout complete"
            );
            Ok((detail, payment))
        }
        Err(e) => {
            error!(sale_id = %sale_id, error = %e, "Commit failed, discarding receipt");
            state.receipts.remove(&sale_id).await;
            Err(e.into())
        }
    }
}
