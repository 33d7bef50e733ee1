//! Storage errors.
//!
//! Repositories return [`DbError`]. A business rule that refuses a write
//! (unknown product, short stock, empty cart) travels as
//! [`DbError::Rejected`] so the server can map it back to the client-facing
//! code without string matching.

use sqlx::error::ErrorKind;
use tally_core::CoreError;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` is the column name, or a caller-chosen label such as
    /// `"payment for sale"` when the rule is enforced in code.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// BEGIN or COMMIT did not go through; nothing from the transaction is visible.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Column named by SQLite's `UNIQUE constraint failed: users.email`.
fn unique_column(message: &str) -> &str {
    message
        .rsplit_once(": ")
        .map(|(_, target)| target)
        .and_then(|target| target.split(',').next())
        .map(|target| target.rsplit('.').next().unwrap_or(target).trim())
        .unwrap_or("value")
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    DbError::duplicate(unique_column(db_err.message()), "unknown")
                }
                _ => DbError::QueryFailed(db_err.message().to_string()),
            },
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionFailed("timed out waiting for a connection".to_string())
            }
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_column_from_sqlite_message() {
        assert_eq!(unique_column("UNIQUE constraint failed: users.email"), "email");
        assert_eq!(
            unique_column("UNIQUE constraint failed: payments.sale_id, payments.method"),
            "sale_id"
        );
        assert_eq!(unique_column("constraint failed"), "value");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_rejected_keeps_core_message() {
        let err: DbError = CoreError::ProductNotFound("p-1".into()).into();
        assert_eq!(err.to_string(), "Product not found: p-1");
    }
}
