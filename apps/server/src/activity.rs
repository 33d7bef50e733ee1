//! # Activity Logging
//!
//! Best-effort audit trail for user actions.
//!
//! ```text
//! handler
//!   │  meta.success(user, action, target, details, status)
//!   │  meta.failure(user, action, target, &err)
//!   ▼
//! ActivityLogger::record(NewActivity)
//!   │  tokio::spawn ── returns immediately
//!   ▼
//! ActivitySink::write  ── Err ──► warn!, dropped
//! ```
//!
//! Each handler names its own target. A failed write never changes the
//! response the client receives.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts, OriginalUri};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::warn;

use tally_core::{ActivityAction, ActivityStatus, ActivityTarget, NewActivity};
use tally_db::ActivityRepository;

use crate::error::ApiError;

/// Where activity entries end up.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn write(&self, entry: &NewActivity) -> anyhow::Result<()>;
}

#[async_trait]
impl ActivitySink for ActivityRepository {
    async fn write(&self, entry: &NewActivity) -> anyhow::Result<()> {
        self.insert(entry).await?;
        Ok(())
    }
}

/// Fire-and-forget front of an [`ActivitySink`].
#[derive(Clone)]
pub struct ActivityLogger {
    sink: Arc<dyn ActivitySink>,
}

impl ActivityLogger {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        ActivityLogger { sink }
    }

    /// Writes the entry on a background task. The handle is only useful to
    /// tests; handlers drop it.
    pub fn record(&self, entry: NewActivity) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.write(&entry).await {
                warn!(
                    error = %e,
                    action = ?entry.action,
                    user_id = %entry.user_id,
                    "Failed to record activity"
                );
            }
        })
    }
}

/// Request details copied into every activity entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        });

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(RequestMeta {
            method: parts.method.to_string(),
            path,
            ip_address,
            user_agent,
        })
    }
}

impl RequestMeta {
    pub fn entry(
        &self,
        user_id: &str,
        action: ActivityAction,
        target: ActivityTarget,
        details: impl Into<String>,
        status: ActivityStatus,
        status_code: StatusCode,
    ) -> NewActivity {
        NewActivity {
            user_id: user_id.to_string(),
            action,
            target,
            details: details.into(),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            status,
            metadata: json!({
                "method": self.method,
                "path": self.path,
                "status_code": status_code.as_u16(),
            }),
        }
    }

    pub fn success(
        &self,
        user_id: &str,
        action: ActivityAction,
        target: ActivityTarget,
        details: impl Into<String>,
        status_code: StatusCode,
    ) -> NewActivity {
        self.entry(user_id, action, target, details, ActivityStatus::Success, status_code)
    }

    pub fn failure(
        &self,
        user_id: &str,
        action: ActivityAction,
        target: ActivityTarget,
        error: &ApiError,
    ) -> NewActivity {
        self.entry(
            user_id,
            action,
            target,
            error.to_string(),
            ActivityStatus::Failed,
            error.status(),
        )
    }
}
