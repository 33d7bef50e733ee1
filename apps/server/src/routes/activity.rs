//! # Activity Log Routes
//!
//! ```text
//! GET    /api/activity        admin   filters + pagination, newest first
//! GET    /api/activity/{id}   admin   entry plus a resolved target label
//! POST   /api/activity        any     client-side events (LOGOUT, ...)
//! DELETE /api/activity/{id}   admin
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_core::{
    Activity, ActivityAction, ActivityStatus, ActivityTarget, Page, PageRequest, TargetKind,
};
use tally_db::ActivityFilter;

use crate::activity::RequestMeta;
use crate::auth::{require_role, CurrentUser, ADMIN_ONLY};
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub user_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub target_kind: Option<TargetKind>,
    pub status: Option<ActivityStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ActivityQuery {
    fn filter(&self) -> ApiResult<ActivityFilter> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::Validation(
                    "from must not be later than to".to_string(),
                ));
            }
        }
        Ok(ActivityFilter {
            user_id: self.user_id.clone().filter(|id| !id.is_empty()),
            action: self.action,
            target_kind: self.target_kind,
            status: self.status,
            from: self.from,
            to: self.to,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub action: ActivityAction,
    #[serde(default = "system_target")]
    pub target: ActivityTarget,
    #[serde(default)]
    pub details: String,
    pub status: Option<ActivityStatus>,
    pub metadata: Option<Value>,
}

fn system_target() -> ActivityTarget {
    ActivityTarget::System
}

#[derive(Debug, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub target_label: Option<String>,
}

/// GET /api/activity
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> ApiResult<Json<Page<Activity>>> {
    require_role(&user, ADMIN_ONLY)?;

    let filter = query.filter()?;
    let page = PageRequest::new(query.page, query.per_page);
    Ok(Json(state.db.activities().list(&filter, page).await?))
}

/// GET /api/activity/{id}
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ActivityView>> {
    require_role(&user, ADMIN_ONLY)?;

    let repo = state.db.activities();
    let activity = repo
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Activity {id} not found")))?;
    let target_label = repo.resolve_target_label(&activity.target).await?;

    Ok(Json(ActivityView {
        activity,
        target_label,
    }))
}

/// POST /api/activity
///
/// Written synchronously so the caller gets the stored entry back.
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    ApiJson(req): ApiJson<CreateActivityRequest>,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    let mut entry = meta.entry(
        &user.id,
        req.action,
        req.target,
        req.details,
        req.status.unwrap_or(ActivityStatus::Success),
        StatusCode::CREATED,
    );

    match req.metadata {
        Some(Value::Object(extra)) => {
            if let Value::Object(base) = &mut entry.metadata {
                for (key, value) in extra {
                    base.entry(key).or_insert(value);
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => {
            return Err(ApiError::Validation(
                "metadata must be a JSON object".to_string(),
            ))
        }
    }

    let activity = state.db.activities().insert(&entry).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// DELETE /api/activity/{id}
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_role(&user, ADMIN_ONLY)?;

    state.db.activities().delete(&id).await?;

    state.activity.record(meta.success(
        &user.id,
        ActivityAction::DeleteActivity,
        ActivityTarget::System,
        format!("Deleted activity {id}"),
        StatusCode::NO_CONTENT,
    ));

    Ok(StatusCode::NO_CONTENT)
}
