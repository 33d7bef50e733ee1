//! # Tally Server
//!
//! HTTP API for Tally POS.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client ──► TraceLayer ──► CORS ──► Router                              │
//! │                                       │                                 │
//! │             ┌─────────────────────────┴─────────────────────┐           │
//! │             ▼                                               ▼           │
//! │      public routes                                 require_auth         │
//! │      /health, /api/auth/{signup,login,...}               │              │
//! │                                                          ▼              │
//! │                                     products, sales, receipts, payments │
//! │                                     dashboard, activity, auth/me ...    │
//! │                                                          │              │
//! │                        AppState { db, config, jwt, mailer,              │
//! │                                   receipts, activity }                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod activity;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod mailer;
pub mod receipts;
pub mod routes;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use tally_db::Database;

use crate::activity::{ActivityLogger, ActivitySink};
use crate::auth::JwtManager;
use crate::config::ServerConfig;
use crate::error::expose_internal_detail;
use crate::mailer::{HttpMailer, LogMailer, Mailer};
use crate::receipts::ReceiptStore;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
    pub jwt: Arc<JwtManager>,
    pub mailer: Arc<dyn Mailer>,
    pub receipts: ReceiptStore,
    pub activity: ActivityLogger,
}

impl AppState {
    /// State with the activity log written to the database.
    pub fn new(db: Database, config: ServerConfig, mailer: Arc<dyn Mailer>) -> Self {
        let sink: Arc<dyn ActivitySink> = Arc::new(db.activities());
        AppState {
            jwt: Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_lifetime_secs)),
            receipts: ReceiptStore::new(config.receipts_dir.clone()),
            activity: ActivityLogger::new(sink),
            config: Arc::new(config),
            mailer,
            db,
        }
    }

    /// Swaps the activity sink (tests use a failing one).
    pub fn with_activity_sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.activity = ActivityLogger::new(sink);
        self
    }
}

/// Relay mailer when `MAIL_RELAY_URL` is set, log mailer otherwise.
pub fn mailer_from_config(config: &ServerConfig) -> Arc<dyn Mailer> {
    match &config.mail_relay_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone(), config.mail_from.clone())),
        None => Arc::new(LogMailer::new(!config.is_production())),
    }
}

/// Builds the full application router.
///
/// Outside production, internal error bodies carry a `detail` with the cause.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let production = state.config.is_production();

    let mut app = routes::router(state);
    if !production {
        app = app.layer(middleware::from_fn(expose_internal_detail));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}
