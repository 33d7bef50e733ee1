//! HTTP routes.

pub mod activity;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod payments;
pub mod products;
pub mod receipts;
pub mod sales;

use axum::routing::{get, post, put};
use axum::{middleware, Router};
use serde::Deserialize;

use tally_core::PageRequest;

use crate::auth::require_auth;
use crate::AppState;

/// Create the combined router
pub fn router(state: AppState) -> Router {
    // No token required
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify-email", get(auth::verify_email))
        .route("/api/auth/resend-verification", post(auth::resend_verification))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password));

    // Bearer token required; roles are checked per handler
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/profile", put(auth::update_profile))
        .route("/api/auth/update-password", put(auth::update_password))
        .route("/api/products", get(products::list).post(products::create))
        .route(
            "/api/products/{id}",
            get(products::get).put(products::update).delete(products::delete),
        )
        .route("/api/sales", get(sales::list).post(sales::create))
        .route("/api/sales/{id}", get(sales::get).delete(sales::delete))
        .route("/api/receipts", get(receipts::list))
        .route("/api/receipts/pdf/{sale_id}", get(receipts::download))
        .route("/api/payments", get(payments::list).post(payments::create))
        .route("/api/dashboard/summary", get(dashboard::summary))
        .route("/api/dashboard/payment-methods", get(dashboard::payment_methods))
        .route("/api/dashboard/top-products", get(dashboard::top_products))
        .route("/api/activity", get(activity::list).post(activity::create))
        .route(
            "/api/activity/{id}",
            get(activity::get).delete(activity::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}

/// `?page=&per_page=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}
