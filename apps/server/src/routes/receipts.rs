//! Receipt listing and download. Artifacts are written at checkout and
//! served as stored; nothing is regenerated here.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use tally_core::{ActivityAction, ActivityTarget, Page, Sale};

use super::PageParams;
use crate::activity::RequestMeta;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiQuery, ApiResult};
use crate::receipts::ReceiptStore;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ReceiptEntry {
    #[serde(flatten)]
    pub sale: Sale,
    pub has_receipt: bool,
    pub download_path: String,
}

/// GET /api/receipts
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Json<Page<ReceiptEntry>>> {
    let page = params.request();
    let sales = state.db.sales().list(page).await?;

    let mut items = Vec::with_capacity(sales.items.len());
    for sale in sales.items {
        items.push(ReceiptEntry {
            has_receipt: state.receipts.exists(&sale.id).await,
            download_path: format!("/api/receipts/pdf/{}", sale.id),
            sale,
        });
    }

    Ok(Json(page.into_page(items, sales.total)))
}

/// GET /api/receipts/pdf/{sale_id}
pub async fn download(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    Path(sale_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let file_name = ReceiptStore::file_name(&sale_id)?;
    let target = ActivityTarget::Sale(sale_id.clone());

    let Some(bytes) = state.receipts.load(&sale_id).await? else {
        let err = ApiError::NotFound(format!("Receipt for sale {sale_id} not found"));
        state.activity.record(meta.failure(
            &user.id,
            ActivityAction::DownloadReceipt,
            target,
            &err,
        ));
        return Err(err);
    };

    state.activity.record(meta.success(
        &user.id,
        ActivityAction::DownloadReceipt,
        target,
        "Downloaded receipt",
        StatusCode::OK,
    ));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}
