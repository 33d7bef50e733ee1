//! Integer money.
//!
//! Every amount in the system is an `i64` count of cents: product prices,
//! the unit price snapshot on a sale line, sale totals and payments. Only
//! receipts and log lines turn one into `$10.99`.
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(1099);
//! let total: Money = [price.multiply_quantity(2), Money::from_cents(500)]
//!     .into_iter()
//!     .sum();
//! assert_eq!(total.cents(), 2698);
//! assert_eq!(total.to_string(), "$26.98");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use ts_rs::TS;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn zero() -> Self {
        Money(0)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Unchecked; for stored lines whose total was already checked at sale time.
    pub const fn multiply_quantity(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `None` on overflow. Used when pricing a cart from the client.
    pub fn checked_line_total(self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}
