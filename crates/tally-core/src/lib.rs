//! # tally-core
//!
//! Domain types and rules for Tally POS. Functions here take plain data
//! and return plain data; the store (`tally-db`) and the HTTP server
//! (`apps/server`) supply the I/O.
//!
//! - [`types`]: products, sales, payments, users, activity entries
//! - [`money`]: integer cents
//! - [`checkout`]: checks a cart against stock and prices it
//! - [`receipt`]: what a receipt says, independent of how it is drawn
//! - [`validation`]: field rules shared by handlers and repositories
//!
//! ```rust
//! use tally_core::Money;
//!
//! let total = Money::from_cents(1000).multiply_quantity(2);
//! assert_eq!(total.to_string(), "$20.00");
//! ```

pub mod checkout;
pub mod error;
pub mod money;
pub mod receipt;
pub mod types;
pub mod validation;

pub use checkout::{plan_checkout, CartLine, CheckoutPlan, PlannedLine, StockDecrement};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use receipt::ReceiptDocument;
pub use types::*;

/// Most lines a single sale may carry.
pub const MAX_CART_ITEMS: usize = 100;

/// Most units on one line; catches a mistyped 1000 for 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

pub const MAX_STOCK_QUANTITY: i64 = 1_000_000;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
