//! Business rule and input errors.
//!
//! Nothing here knows about HTTP. The server turns [`CoreError`] into a
//! status code and a machine-readable `code`; storage wraps it in
//! `DbError::Rejected` when a rule fails inside a transaction.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// `requested` sums every cart line that names the product, so
    /// `[{Widget, 4}, {Widget, 3}]` against 5 on hand reports 7.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        product: String,
        available: i64,
        requested: i64,
    },

    #[error("Sale {0} is already fully paid")]
    SaleAlreadyPaid(String),

    #[error("Payment of {requested} cents exceeds the outstanding balance of {balance} cents")]
    PaymentExceedsBalance { balance: i64, requested: i64 },

    #[error("A sale must contain at least one item")]
    EmptyCart,

    #[error("A sale cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Rejected input, raised before any rule or query runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn too_long(field: &str, max: usize) -> Self {
        ValidationError::TooLong {
            field: field.to_string(),
            max,
        }
    }
}
