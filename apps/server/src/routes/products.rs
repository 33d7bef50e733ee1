//! Product catalogue handlers. Reads for any role, writes for admins.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use tally_core::{ActivityAction, ActivityTarget, Product};
use tally_db::{NewProduct, ProductFilter, ProductUpdate};

use crate::activity::RequestMeta;
use crate::auth::{require_role, CurrentUser, ADMIN_ONLY};
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: i64,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
    pub category: Option<String>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            price_cents: req.price_cents,
            quantity: req.quantity,
            category: req.category,
        }
    }
}

impl From<UpdateProductRequest> for ProductUpdate {
    fn from(req: UpdateProductRequest) -> Self {
        ProductUpdate {
            name: req.name,
            description: req.description,
            price_cents: req.price_cents,
            quantity: req.quantity,
            category: req.category,
        }
    }
}

/// GET /api/products?search=&category=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let filter = ProductFilter {
        search: query.search,
        category: query.category,
    };
    Ok(Json(state.db.products().list(&filter).await?))
}

/// GET /api/products/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_role(&user, ADMIN_ONLY)?;

    let result = state
        .db
        .products()
        .insert(&req.into())
        .await
        .map_err(ApiError::from);

    match result {
        Ok(product) => {
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::CreateProduct,
                ActivityTarget::Product(product.id.clone()),
                format!("Created product {}", product.name),
                StatusCode::CREATED,
            ));
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(err) => {
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::CreateProduct,
                ActivityTarget::System,
                &err,
            ));
            Err(err)
        }
    }
}

/// PUT /api/products/{id}
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    require_role(&user, ADMIN_ONLY)?;

    let target = ActivityTarget::Product(id.clone());
    match state.db.products().update(&id, &req.into()).await {
        Ok(product) => {
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::UpdateProduct,
                target,
                format!("Updated product {}", product.name),
                StatusCode::OK,
            ));
            Ok(Json(product))
        }
        Err(e) => {
            let err = ApiError::from(e);
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::UpdateProduct,
                target,
                &err,
            ));
            Err(err)
        }
    }
}

/// DELETE /api/products/{id}
///
/// Past sale lines keep their snapshot price; their product name resolves
/// to nothing afterwards.
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_role(&user, ADMIN_ONLY)?;

    let target = ActivityTarget::Product(id.clone());
    match state.db.products().delete(&id).await {
        Ok(()) => {
            state.activity.record(meta.success(
                &user.id,
                ActivityAction::DeleteProduct,
                target,
                "Deleted product",
                StatusCode::NO_CONTENT,
            ));
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            let err = ApiError::from(e);
            state.activity.record(meta.failure(
                &user.id,
                ActivityAction::DeleteProduct,
                target,
                &err,
            ));
            Err(err)
        }
    }
}
