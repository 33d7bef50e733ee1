//! # API Errors
//!
//! What a client sees when a request fails.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ─┐                                                     │
//! │  CoreError ───────┼──► DbError ──► ApiError ──► HTTP status + JSON     │
//! │  sqlx::Error ─────┘                                                     │
//! │                                                                         │
//! │  VALIDATION_ERROR          400    INVALID_OR_EXPIRED_TOKEN   400       │
//! │  NOT_FOUND                 404    FORBIDDEN                  403       │
//! │  UNAUTHORIZED              401    INSUFFICIENT_STOCK         400       │
//! │  INVALID_CREDENTIALS       401    CONFLICT                   400       │
//! │  NOT_VERIFIED              403    INTERNAL_ERROR             500       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Body: `{"code": "...", "message": "..."}`. Internal causes are always
//! logged. Outside production, [`expose_internal_detail`] copies the cause
//! into a `detail` field.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use tally_core::CoreError;
use tally_db::DbError;

/// Errors returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Unknown email and wrong password look the same.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    NotVerified,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    InsufficientStock(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Authentication required".to_string())
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        ApiError::Internal(cause.to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::NotVerified => "NOT_VERIFIED",
            ApiError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::InvalidOrExpiredToken
            | ApiError::InsufficientStock(_)
            | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotVerified | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Cause of an `INTERNAL_ERROR` response, kept out of the body.
#[derive(Debug, Clone)]
pub struct InternalCause(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let cause = match &self {
            ApiError::Internal(cause) => {
                error!(error = %cause, "Internal error");
                Some(InternalCause(cause.clone()))
            }
            _ => None,
        };

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            detail: None,
        };

        let mut response = (self.status(), Json(body)).into_response();
        if let Some(cause) = cause {
            response.extensions_mut().insert(cause);
        }
        response
    }
}

/// Development layer: rewrites internal error bodies to carry the cause.
pub async fn expose_internal_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(InternalCause(cause)) = response.extensions().get::<InternalCause>().cloned() else {
        return response;
    };

    let err = ApiError::Internal(String::new());
    let body = ErrorBody {
        code: err.code(),
        message: err.to_string(),
        detail: Some(&cause),
    };
    (response.status(), Json(body)).into_response()
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(_) | CoreError::SaleNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            CoreError::InsufficientStock { .. } => ApiError::InsufficientStock(err.to_string()),
            CoreError::SaleAlreadyPaid(_) => ApiError::Conflict(err.to_string()),
            CoreError::PaymentExceedsBalance { .. } => ApiError::Validation(err.to_string()),
            CoreError::Validation(inner) => ApiError::Validation(inner.to_string()),
            CoreError::EmptyCart | CoreError::CartTooLarge { .. } => {
                ApiError::Validation(err.to_string())
            }
        }
    }
}

impl From<tally_core::ValidationError> for ApiError {
    fn from(err: tally_core::ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rejected(core) => core.into(),
            DbError::NotFound { entity, .. } => ApiError::NotFound(format!("{entity} not found")),
            DbError::UniqueViolation { field, .. } if field == "email" => {
                ApiError::Conflict("Email is already registered".to_string())
            }
            DbError::UniqueViolation { field, .. } => {
                ApiError::Conflict(format!("{field} already exists"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// `axum::Json` whose rejection is a `VALIDATION_ERROR` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` whose rejection is a `VALIDATION_ERROR` body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
