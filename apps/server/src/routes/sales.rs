//! Sale handlers.
//!
//! `POST /api/sales` is the checkout: stock, sale, payment and receipt are
//! written together or not at all (see [`crate::checkout`]).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::checkout::CartLine;
use tally_core::{ActivityAction, ActivityTarget, Page, Payment, PaymentMethod, SaleDetail};
use tally_db::NewSale;

use super::PageParams;
use crate::activity::RequestMeta;
use crate::auth::{require_role, CurrentUser, ADMIN_ONLY, SALES_STAFF};
use crate::checkout::create_sale;
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    #[serde(alias = "products")]
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    /// Partial tender; omitted means paid in full.
    pub amount_paid_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SaleCreated {
    pub sale: SaleDetail,
    pub payment: Payment,
}

/// GET /api/sales
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<SaleDetail>>> {
    Ok(Json(state.db.sales().list_detailed(params.request()).await?))
}

/// GET /api/sales/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    state
        .db
        .sales()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Sale {id} not found")))
}

/// POST /api/sales
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    ApiJson(req): ApiJson<CreateSaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleCreated>)> {
    require_role(&user, SALES_STAFF)?;

    let new = NewSale {
        cashier_id: Some(user.id.clone()),
        lines: req.items,
        payment_method: req.payment_method,
        customer_name: req.customer_name,
        customer_email: req.customer_email,
        amount_paid_cents: req.amount_paid_cents,
    };

    match create_sale(&state, &new).await {
        Ok((sale, payment)) => {
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::CreateSale,
                ActivityTarget::Sale(sale.sale.id.clone()),
                format!(
                    "Sale of {} items, total {} cents",
                    sale.lines.len(),
                    sale.sale.total_cents
                ),
                StatusCode::CREATED,
            ));
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::GenerateReceipt,
                ActivityTarget::Sale(sale.sale.id.clone()),
                "Receipt generated",
                StatusCode::CREATED,
            ));
            Ok((StatusCode::CREATED, Json(SaleCreated { sale, payment })))
        }
        Err(err) => {
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::CreateSale,
                ActivityTarget::System,
                &err,
            ));
            Err(err)
        }
    }
}

/// DELETE /api/sales/{id}
///
/// Stock is not restored. The stored receipt goes with the sale.
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_role(&user, ADMIN_ONLY)?;

    let target = ActivityTarget::Sale(id.clone());
    match state.db.sales().delete(&id).await {
        Ok(()) => {
            state.receipts.remove(&id).await;
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::DeleteSale,
                target,
                "Deleted sale",
                StatusCode::NO_CONTENT,
            ));
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            let err = ApiError::from(e);
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::DeleteSale,
                target,
                &err,
            ));
            Err(err)
        }
    }
}
