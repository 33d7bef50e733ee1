//! # Checkout Planning
//!
//! Turns a submitted cart into a priced, stock-checked plan without touching
//! storage. The database layer loads the products, calls [`plan_checkout`],
//! and only then starts writing.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  [{A, 2}, {B, 1}, {A, 3}]                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_cart   empty? too many lines? quantity 1..=999?               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_checkout   in array order:                                        │
//! │       │            product missing       → ProductNotFound              │
//! │       │            running total for A   → InsufficientStock when > qoh │
//! │       ▼                                                                 │
//! │  CheckoutPlan    lines (price snapshot), decrements {A: 5, B: 1}, total │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Product;
use crate::validation::validate_quantity;
use crate::MAX_CART_ITEMS;

/// One line of a submitted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A priced line, ready to be written as a sale line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub position: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// Total quantity to take from one product's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    /// Quantity-on-hand observed while planning.
    pub available: i64,
}

impl StockDecrement {
    /// The error to report when the decrement loses a race at write time.
    pub fn shortfall(&self, available_now: i64) -> CoreError {
        CoreError::InsufficientStock {
            product_id: self.product_id.clone(),
            product: self.product_name.clone(),
            available: available_now,
            requested: self.quantity,
        }
    }
}

/// Result of planning a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    /// One entry per distinct product, in first-seen order.
    pub decrements: Vec<StockDecrement>,
    pub total: Money,
}

/// Checks the cart's shape: non-empty, bounded, sane quantities.
pub fn validate_cart(lines: &[CartLine]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    if lines.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            }
            .into());
        }
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Validates and prices `lines` against the products returned by `lookup`.
///
/// Lines referencing the same product are checked against its stock
/// together. Fails on the first line, in array order, that is missing or
/// would overdraw stock.
pub fn plan_checkout<'a, F>(lines: &[CartLine], mut lookup: F) -> CoreResult<CheckoutPlan>
where
    F: FnMut(&str) -> Option<&'a Product>,
{
    validate_cart(lines)?;

    let mut planned = Vec::with_capacity(lines.len());
    let mut decrements: Vec<StockDecrement> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    let mut total = Money::zero();

    for (position, line) in lines.iter().enumerate() {
        let product = lookup(&line.product_id)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        let idx = *index_of.entry(line.product_id.as_str()).or_insert_with(|| {
            decrements.push(StockDecrement {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: 0,
                available: product.quantity,
            });
            decrements.len() - 1
        });

        let decrement = &mut decrements[idx];
        let requested = decrement.quantity + line.quantity;
        if !product.can_sell(requested) {
            return Err(CoreError::InsufficientStock {
                product_id: product.id.clone(),
                product: product.name.clone(),
                available: product.quantity,
                requested,
            });
        }
        decrement.quantity = requested;

        let line_total = product
            .price()
            .checked_line_total(line.quantity)
            .ok_or_else(total_overflow)?;
        total = total.checked_add(line_total).ok_or_else(total_overflow)?;

        planned.push(PlannedLine {
            position: position as i64,
            product_id: product.id.clone(),
            quantity: line.quantity,
            unit_price_cents: product.price_cents,
            line_total_cents: line_total.cents(),
        });
    }

    Ok(CheckoutPlan {
        lines: planned,
        decrements,
        total,
    })
}

fn total_overflow() -> CoreError {
    ValidationError::OutOfRange {
        field: "total".to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
