//! # tally-db
//!
//! SQLite storage for Tally POS. All SQL in the workspace is in this crate.
//!
//! A [`Database`] wraps one sqlx pool and hands out repositories that share
//! it. Writes that must be all-or-nothing (checkout, manual payments) run in
//! a transaction owned by the repository; the checkout transaction is handed
//! back to the caller as a [`PendingCheckout`] so the receipt can be written
//! before it commits.
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig, ProductFilter};
//!
//! let db = Database::new(DbConfig::new("./data/tally.db")).await?;
//! let stocked = db.products().list(&ProductFilter::default()).await?;
//! db.close().await;
//! ```

pub mod credentials;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::activity::{ActivityFilter, ActivityRepository};
pub use repository::dashboard::DashboardRepository;
pub use repository::payment::{NewPayment, PaymentRepository};
pub use repository::product::{NewProduct, ProductFilter, ProductRepository, ProductUpdate};
pub use repository::sale::{NewSale, PendingCheckout, SaleRepository};
pub use repository::user::{NewUser, UserRecord, UserRepository};
