//! # Receipt Layout
//!
//! Builds the printable content of a receipt from a sale. Rendering to PDF
//! happens in the server; this module only decides what goes on the page,
//! so the same sale always produces the same document.
//!
//! ```text
//! Sales Receipt
//! Sale ID: 6f1c...            Customer: Jane Doe
//! Payment: Cash               Date: 2024-05-01 14:03:22 UTC
//! ───────────────────────────────────────────────────────────
//! Item                 Qty     Unit       Total
//! Widget                 2   $10.00      $20.00
//! Unknown Product        1    $2.50       $2.50
//! ───────────────────────────────────────────────────────────
//! Total                                  $22.50
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::SaleDetail;

pub const RECEIPT_TITLE: &str = "Sales Receipt";
/// Printed for lines whose product no longer exists.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
/// Printed when the sale has no customer name.
pub const NO_CUSTOMER: &str = "N/A";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One printed item row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub name: String,
    pub quantity: i64,
    pub unit_price: String,
    pub line_total: String,
}

/// Everything printed on a receipt, already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    pub title: String,
    pub sale_id: String,
    pub customer: String,
    pub payment_method: String,
    pub issued_at: String,
    pub rows: Vec<ReceiptRow>,
    pub total: String,
}

impl ReceiptDocument {
    pub fn from_sale(detail: &SaleDetail) -> Self {
        let sale = &detail.sale;

        let customer = sale
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(NO_CUSTOMER)
            .to_string();

        let rows = detail
            .lines
            .iter()
            .map(|line| ReceiptRow {
                name: line
                    .product_name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
                quantity: line.quantity,
                unit_price: Money::from_cents(line.unit_price_cents).to_string(),
                line_total: Money::from_cents(line.line_total_cents).to_string(),
            })
            .collect();

        Self {
            title: RECEIPT_TITLE.to_string(),
            sale_id: sale.id.clone(),
            customer,
            payment_method: sale.payment_method.label().to_string(),
            issued_at: sale.created_at.format(DATE_FORMAT).to_string(),
            rows,
            total: sale.total().to_string(),
        }
    }

    /// Header block, one entry per printed line.
    pub fn header_lines(&self) -> Vec<String> {
        vec![
            format!("Sale ID: {}", self.sale_id),
            format!("Customer: {}", self.customer),
            format!("Payment Method: {}", self.payment_method),
            format!("Date: {}", self.issued_at),
        ]
    }
}

/// Cuts `s` to at most `max` characters, on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
