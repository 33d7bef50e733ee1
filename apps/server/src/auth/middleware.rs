//! Bearer-token middleware for protected routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::jwt::extract_bearer_token;
use super::CurrentUser;
use crate::error::ApiError;
use crate::AppState;

/// Verifies the session token and attaches the account to the request.
///
/// Missing header, wrong scheme, bad signature, expiry and a deleted account
/// all produce the same `401`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or_else(ApiError::unauthorized)?;

    let claims = state.jwt.validate(token)?;

    let user = state
        .db
        .users()
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "Token for a missing account");
            ApiError::unauthorized()
        })?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
