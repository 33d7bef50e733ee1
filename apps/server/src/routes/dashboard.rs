//! Dashboard aggregates, recomputed on every call.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use tally_core::{ActivityAction, ActivityTarget, DashboardSummary, PaymentMethodBreakdown, TopProduct};

use crate::activity::RequestMeta;
use crate::auth::CurrentUser;
use crate::error::{ApiQuery, ApiResult};
use crate::AppState;

const DEFAULT_TOP_PRODUCTS: u32 = 5;
const MAX_TOP_PRODUCTS: u32 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<u32>,
}

impl TopProductsQuery {
    fn limit(&self) -> i64 {
        i64::from(
            self.limit
                .unwrap_or(DEFAULT_TOP_PRODUCTS)
                .clamp(1, MAX_TOP_PRODUCTS),
        )
    }
}

/// GET /api/dashboard/summary
pub async fn summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
) -> ApiResult<Json<DashboardSummary>> {
    let summary = state.db.dashboard().summary().await?;

    state.activity.record(meta.success(
        &user.id,
        ActivityAction::ViewDashboard,
        ActivityTarget::System,
        "Viewed dashboard",
        StatusCode::OK,
    ));

    Ok(Json(summary))
}

/// GET /api/dashboard/payment-methods
pub async fn payment_methods(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PaymentMethodBreakdown>>> {
    Ok(Json(state.db.dashboard().payment_methods().await?))
}

/// GET /api/dashboard/top-products?limit=N
pub async fn top_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopProductsQuery>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    Ok(Json(state.db.dashboard().top_products(query.limit()).await?))
}
