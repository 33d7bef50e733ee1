//! One repository per table family. Each holds a clone of the pool and is
//! cheap to create, so handlers ask the [`Database`](crate::Database) for a
//! fresh one per request.
//!
//! | repository | owns |
//! |---|---|
//! | [`product::ProductRepository`] | products, search, stock edits |
//! | [`sale::SaleRepository`] | checkout transaction, sales and lines |
//! | [`payment::PaymentRepository`] | payments |
//! | [`user::UserRepository`] | accounts, verification and reset tokens |
//! | [`activity::ActivityRepository`] | audit entries, target labels |
//! | [`dashboard::DashboardRepository`] | read-only aggregates |

pub mod activity;
pub mod dashboard;
pub mod payment;
pub mod product;
pub mod sale;
pub mod user;

use chrono::Utc;
use uuid::Uuid;

/// Random v4 UUID, used as the primary key of every row.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
