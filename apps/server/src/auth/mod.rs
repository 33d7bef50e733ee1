//! # Authentication & Authorization
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Authorization: Bearer <jwt>                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  require_auth (middleware.rs)                                           │
//! │   ├── JwtManager::validate   (jwt.rs)     ── bad/expired ──► 401        │
//! │   ├── users().find_by_id(sub)             ── missing ──────► 401        │
//! │   └── extensions += CurrentUser(User)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  handler(CurrentUser(user))                                             │
//! │   └── require_role(&user, &[Role::Admin])  ── other role ──► 403        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod jwt;
pub mod middleware;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{ApiError, ApiResult};
use tally_core::{Role, User};

pub use jwt::{Claims, JwtManager};
pub use middleware::require_auth;

/// The authenticated account, attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const SALES_STAFF: &[Role] = &[Role::Admin, Role::Cashier];

/// Fails with `Forbidden` unless the user holds one of `allowed`.
pub fn require_role(user: &User, allowed: &[Role]) -> ApiResult<()> {
    if user.has_role(allowed) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.id, role = %user.role, "Role not permitted");
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn with_role(role: Role) -> User {
        User {
            id: "u1".into(),
            name: "Test".into(),
            email: "t@example.com".into(),
            role,
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&with_role(Role::Admin), ADMIN_ONLY).is_ok());
        assert!(matches!(
            require_role(&with_role(Role::Cashier), ADMIN_ONLY),
            Err(ApiError::Forbidden)
        ));
        assert!(require_role(&with_role(Role::Cashier), SALES_STAFF).is_ok());
        assert!(require_role(&with_role(Role::Viewer), SALES_STAFF).is_err());
    }
}
