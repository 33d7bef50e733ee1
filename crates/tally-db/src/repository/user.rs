//! # User Repository
//!
//! Accounts and their one-time tokens.
//!
//! ## Token Lifecycle
//! ```text
//! signup ──► verification_token_hash + expires_at
//!               │
//!               ▼  GET /api/auth/verify-email?token=...
//!            is_verified = 1   (hash kept so a repeat click is recognised)
//!
//! forgot ──► reset_token_hash + expires_at
//!               │
//!               ▼  POST /api/auth/reset-password
//!            password_hash replaced, reset columns cleared
//! ```
//!
//! Callers pass token *digests* (see [`crate::credentials::hash_token`]);
//! clear tokens never reach this module.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, now};
use tally_core::{Role, User};

const USER_COLUMNS: &str = "id, name, email, role, is_verified, created_at, updated_at";

const RECORD_COLUMNS: &str = "id, name, email, password_hash, role, is_verified, \
     verification_token_hash, verification_expires_at, reset_token_hash, reset_expires_at, \
     created_at, updated_at";

/// Full account row, credentials included. Never serialized.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn verification_expired(&self, at: DateTime<Utc>) -> bool {
        self.verification_expires_at.map_or(true, |exp| exp <= at)
    }

    pub fn reset_expired(&self, at: DateTime<Utc>) -> bool {
        self.reset_expires_at.map_or(true, |exp| exp <= at)
    }
}

/// Fields for a new account. Email must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts an account. A taken email is a `UniqueViolation`.
    pub async fn insert(&self, new: &NewUser) -> DbResult<User> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_row(&mut conn, new, new.role).await?;
        drop(conn);
        self.created(&id, new.role).await
    }

    /// Inserts a self-service signup. The account gets `new.role`, or
    /// `Admin` when it is the first one in the table.
    ///
    /// The emptiness check and the insert share one write transaction, so
    /// two simultaneous first signups cannot both become admin.
    pub async fn insert_signup(&self, new: &NewUser) -> DbResult<User> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        let role = if existing == 0 { Role::Admin } else { new.role };

        let id = insert_row(&mut tx, new, role).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        self.created(&id, role).await
    }

    async fn created(&self, id: &str, role: Role) -> DbResult<User> {
        info!(user_id = %id, role = %role, "User created");
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_record_by_id(&self, id: &str) -> DbResult<Option<UserRecord>> {
        self.find_record("id", id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRecord>> {
        self.find_record("email", email).await
    }

    pub async fn find_by_verification_hash(&self, hash: &str) -> DbResult<Option<UserRecord>> {
        self.find_record("verification_token_hash", hash).await
    }

    pub async fn find_by_reset_hash(&self, hash: &str) -> DbResult<Option<UserRecord>> {
        self.find_record("reset_token_hash", hash).await
    }

    async fn find_record(&self, column: &'static str, value: &str) -> DbResult<Option<UserRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM users WHERE {column} = ?1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Marks the account verified. The token digest stays on the row.
    pub async fn mark_verified(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_verified = 1, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now())
            .execute(&self.pool)
            .await?;
        ensure_found(result.rows_affected(), id)?;
        info!(user_id = %id, "Email verified");
        Ok(())
    }

    /// Replaces the pending verification token.
    pub async fn set_verification_token(
        &self,
        id: &str,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_token_hash = ?2, verification_expires_at = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .bind(now())
        .execute(&self.pool)
        .await?;
        ensure_found(result.rows_affected(), id)
    }

    /// Stores a reset token, replacing any earlier one.
    pub async fn set_reset_token(
        &self,
        id: &str,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = ?2, reset_expires_at = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .bind(now())
        .execute(&self.pool)
        .await?;
        ensure_found(result.rows_affected(), id)
    }

    /// Sets a new password and consumes the reset token.
    pub async fn reset_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?2, reset_token_hash = NULL, reset_expires_at = NULL, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(now())
        .execute(&self.pool)
        .await?;
        ensure_found(result.rows_affected(), id)?;
        info!(user_id = %id, "Password reset");
        Ok(())
    }

    pub async fn update_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(password_hash)
                .bind(now())
                .execute(&self.pool)
                .await?;
        ensure_found(result.rows_affected(), id)?;
        info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Updates name and/or email. Email must already be normalized.
    pub async fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?2, name),
                email = COALESCE(?3, email),
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(name.map(str::trim))
        .bind(email)
        .bind(now())
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                let err = DbError::from(e);
                return Err(if err.is_unique_violation() {
                    DbError::duplicate("email", email.unwrap_or_default())
                } else {
                    err
                });
            }
        };
        ensure_found(result.rows_affected(), id)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        ensure_found(result.rows_affected(), id)
    }
}

fn ensure_found(rows: u64, id: &str) -> DbResult<()> {
    if rows == 0 {
        Err(DbError::not_found("User", id))
    } else {
        Ok(())
    }
}

async fn insert_row(conn: &mut SqliteConnection, new: &NewUser, role: Role) -> DbResult<String> {
    let id = generate_id();
    let now = now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (
            id, name, email, password_hash, role, is_verified,
            verification_token_hash, verification_expires_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        "#,
    )
    .bind(&id)
    .bind(new.name.trim())
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(role)
    .bind(new.is_verified)
    .bind(&new.verification_token_hash)
    .bind(new.verification_expires_at)
    .bind(now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(id),
        Err(e) => {
            let err = DbError::from(e);
            Err(if err.is_unique_violation() {
                DbError::duplicate("email", &new.email)
            } else {
                err
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
