//! Payment handlers. Checkout records the amount tendered at the register;
//! `POST /api/payments` settles whatever balance a partial tender left.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use tally_core::{ActivityAction, ActivityTarget, Page, Payment, PaymentMethod};
use tally_db::NewPayment;

use crate::activity::RequestMeta;
use crate::auth::{require_role, CurrentUser, SALES_STAFF};
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub sale_id: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub sale_id: String,
    pub amount_paid_cents: i64,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
}

/// GET /api/payments?sale_id=&page=&per_page=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaymentQuery>,
) -> ApiResult<Json<Page<Payment>>> {
    let page = tally_core::PageRequest::new(query.page, query.per_page);
    let sale_id = query.sale_id.as_deref().filter(|s| !s.is_empty());
    Ok(Json(state.db.payments().list(sale_id, page).await?))
}

/// POST /api/payments
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    require_role(&user, SALES_STAFF)?;

    let new = NewPayment {
        sale_id: req.sale_id,
        amount_paid_cents: req.amount_paid_cents,
        payment_method: req.payment_method,
        transaction_id: req.transaction_id,
    };

    match state.db.payments().insert(&new).await {
        Ok(payment) => {
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::CreatePayment,
                ActivityTarget::Payment(payment.id.clone()),
                format!(
                    "Payment of {} cents for sale {}",
                    payment.amount_paid_cents, payment.sale_id
                ),
                StatusCode::CREATED,
            ));
            Ok((StatusCode::CREATED, Json(payment)))
        }
        Err(e) => {
            let err = ApiError::from(e);
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::CreatePayment,
                ActivityTarget::Sale(new.sale_id.clone()),
                &err,
            ));
            Err(err)
        }
    }
}
