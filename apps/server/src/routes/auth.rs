//! # Auth Routes
//!
//! ```text
//! POST /api/auth/signup                 public
//! GET  /api/auth/verify-email?token=    public
//! POST /api/auth/resend-verification    public
//! POST /api/auth/login                  public
//! POST /api/auth/forgot-password        public
//! POST /api/auth/reset-password         public
//! GET  /api/auth/me                     bearer
//! PUT  /api/auth/profile                bearer
//! PUT  /api/auth/update-password        bearer
//! ```
//!
//! Passwords are hashed on the blocking pool; argon2 is deliberately slow.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tally_core::validation::{normalize_email, validate_password, validate_person_name};
use tally_core::{ActivityAction, ActivityTarget, Role, User};
use tally_db::credentials::{
    generate_token, hash_password, hash_token, verify_against_dummy, verify_password,
};
use tally_db::{NewUser, UserRecord};

use crate::activity::RequestMeta;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::mailer::templates;
use crate::AppState;

const GENERIC_RESEND: &str =
    "If that account exists and is not verified yet, a new verification email has been sent.";
const GENERIC_FORGOT: &str =
    "If an account with that email exists, a password reset link has been sent.";

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

async fn hash_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

async fn verify_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(ApiError::internal)
}

/// Same argon2 cost as a wrong password, so unknown emails do not answer faster.
async fn reject_unknown_login(password: String) {
    let _ = tokio::task::spawn_blocking(move || verify_against_dummy(&password)).await;
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    meta: RequestMeta,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    validate_person_name(&req.name)?;
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;

    let users = state.db.users();
    if users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let token = generate_token();
    // The first account administers the store
    let user = users
        .insert_signup(&NewUser {
            name: req.name.trim().to_string(),
            email: email.clone(),
            password_hash: hash_blocking(req.password).await?,
            role: Role::Cashier,
            is_verified: false,
            verification_token_hash: Some(hash_token(&token)),
            verification_expires_at: Some(
                Utc::now() + Duration::hours(state.config.verification_ttl_hours),
            ),
        })
        .await?;

    let mail = templates::verification(
        &state.config.public_base_url,
        &user.email,
        &user.name,
        &token,
        state.config.verification_ttl_hours,
    );
    if let Err(e) = state.mailer.send(mail).await {
        warn!(user_id = %user.id, error = %e, "Verification email failed, removing account");
        if let Err(e) = users.delete(&user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to remove account after mail failure");
        }
        return Err(ApiError::internal(format!(
            "Failed to send verification email: {e}"
        )));
    }

    info!(user_id = %user.id, role = %user.role, "Signup");
    state.activity.record(meta.success(
        &user.id,
        ActivityAction::Signup,
        ActivityTarget::User(user.id.clone()),
        format!("Signed up as {}", user.role),
        StatusCode::CREATED,
    ));

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "Signup successful. Please check your email to verify your account."
                .to_string(),
            user,
        }),
    ))
}

/// GET /api/auth/verify-email?token=
pub async fn verify_email(
    State(state): State<AppState>,
    meta: RequestMeta,
    ApiQuery(params): ApiQuery<VerifyParams>,
) -> ApiResult<Json<MessageResponse>> {
    let token = params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("token is required".to_string()))?;

    let users = state.db.users();
    let record = users
        .find_by_verification_hash(&hash_token(token))
        .await?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    if record.is_verified {
        return Ok(message("Email already verified"));
    }
    if record.verification_expired(Utc::now()) {
        return Err(ApiError::InvalidOrExpiredToken);
    }

    users.mark_verified(&record.id).await?;
    state.activity.record(meta.success(
        &record.id,
        ActivityAction::VerifyEmail,
        ActivityTarget::User(record.id.clone()),
        "Email verified",
        StatusCode::OK,
    ));

    Ok(message("Email verified successfully"))
}

/// POST /api/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let Ok(email) = normalize_email(&req.email) else {
        return Ok(message(GENERIC_RESEND));
    };

    let users = state.db.users();
    if let Some(record) = users.find_by_email(&email).await? {
        if !record.is_verified {
            let token = generate_token();
            users
                .set_verification_token(
                    &record.id,
                    &hash_token(&token),
                    Utc::now() + Duration::hours(state.config.verification_ttl_hours),
                )
                .await?;

            let mail = templates::verification(
                &state.config.public_base_url,
                &record.email,
                &record.name,
                &token,
                state.config.verification_ttl_hours,
            );
            if let Err(e) = state.mailer.send(mail).await {
                warn!(user_id = %record.id, error = %e, "Failed to resend verification email");
            }
        }
    }

    Ok(message(GENERIC_RESEND))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let record = match normalize_email(&req.email) {
        Ok(email) => state.db.users().find_by_email(&email).await?,
        Err(_) => None,
    };
    let Some(record) = record else {
        reject_unknown_login(req.password).await;
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_blocking(req.password, record.password_hash.clone()).await? {
        let err = ApiError::InvalidCredentials;
        state.activity.record(meta.failure(
            &record.id,
            ActivityAction::Login,
            ActivityTarget::User(record.id.clone()),
            &err,
        ));
        return Err(err);
    }

    if !record.is_verified {
        return Err(ApiError::NotVerified);
    }

    let user = record.to_user();
    let token = state.jwt.issue(&user)?;

    state.activity.record(meta.success(
        &user.id,
        ActivityAction::Login,
        ActivityTarget::User(user.id.clone()),
        "Logged in",
        StatusCode::OK,
    ));

    Ok(Json(LoginResponse { token, user }))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    meta: RequestMeta,
    ApiJson(req): ApiJson<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let Ok(email) = normalize_email(&req.email) else {
        return Ok(message(GENERIC_FORGOT));
    };

    let users = state.db.users();
    let Some(record) = users.find_by_email(&email).await? else {
        return Ok(message(GENERIC_FORGOT));
    };
    if !record.is_verified {
        return Ok(message(GENERIC_FORGOT));
    }

    let token = generate_token();
    users
        .set_reset_token(
            &record.id,
            &hash_token(&token),
            Utc::now() + Duration::minutes(state.config.reset_ttl_minutes),
        )
        .await?;

    let mail = templates::password_reset(
        &state.config.public_base_url,
        &record.email,
        &record.name,
        &token,
        state.config.reset_ttl_minutes,
    );
    if let Err(e) = state.mailer.send(mail).await {
        warn!(user_id = %record.id, error = %e, "Failed to send password reset email");
    }

    state.activity.record(meta.success(
        &record.id,
        ActivityAction::ForgotPassword,
        ActivityTarget::User(record.id.clone()),
        "Password reset requested",
        StatusCode::OK,
    ));

    Ok(message(GENERIC_FORGOT))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    meta: RequestMeta,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let users = state.db.users();
    let record: UserRecord = users
        .find_by_reset_hash(&hash_token(req.token.trim()))
        .await?
        .filter(|r| !r.reset_expired(Utc::now()))
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    validate_password(&req.password)?;

    let password_hash = hash_blocking(req.password).await?;
    users.reset_password(&record.id, &password_hash).await?;

    state.activity.record(meta.success(
        &record.id,
        ActivityAction::ResetPassword,
        ActivityTarget::User(record.id.clone()),
        "Password reset",
        StatusCode::OK,
    ));

    Ok(message("Password has been reset. You can now log in."))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let name = req.name.as_deref().map(str::trim);
    if let Some(name) = name {
        validate_person_name(name)?;
    }
    let email = req.email.as_deref().map(normalize_email).transpose()?;

    if name.is_none() && email.is_none() {
        return Err(ApiError::Validation(
            "Provide a name or an email to update".to_string(),
        ));
    }

    let result = state
        .db
        .users()
        .update_profile(&user.id, name, email.as_deref())
        .await
        .map_err(ApiError::from);

    match result {
        Ok(updated) => {
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::UpdateProfile,
                ActivityTarget::User(user.id.clone()),
                "Profile updated",
                StatusCode::OK,
            ));
            Ok(Json(UserResponse {
                message: "Profile updated".to_string(),
                user: updated,
            }))
        }
        Err(err) => {
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::UpdateProfile,
                ActivityTarget::User(user.id.clone()),
                &err,
            ));
            Err(err)
        }
    }
}

/// PUT /api/auth/update-password
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    ApiJson(req): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    validate_password(&req.new_password)?;

    let users = state.db.users();
    let record = users
        .find_record_by_id(&user.id)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    if !verify_blocking(req.current_password, record.password_hash).await? {
        let err = ApiError::Unauthorized("Current password is incorrect".to_string());
        state.activity.record(meta.failure(
            &user.id,
            ActivityAction::UpdatePassword,
            ActivityTarget::User(user.id.clone()),
            &err,
        ));
        return Err(err);
    }

    let password_hash = hash_blocking(req.new_password).await?;
    users.update_password(&user.id, &password_hash).await?;

    state.activity.record(meta.success(
        &user.id,
        ActivityAction::UpdatePassword,
        ActivityTarget::User(user.id.clone()),
        "Password changed",
        StatusCode::OK,
    ));

    Ok(message("Password updated"))
}
