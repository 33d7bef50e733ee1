//! HTTP-level tests: the full router against an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

use tally_core::{NewActivity, Role};
use tally_db::credentials::hash_password;
use tally_db::{Database, DbConfig, NewUser};
use tally_server::activity::ActivitySink;
use tally_server::config::{AppEnv, ServerConfig};
use tally_server::mailer::{Email, MailError, Mailer};
use tally_server::{build_router, AppState};

// =============================================================================
// Harness
// =============================================================================

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    /// Token from the newest mail sent to `to`.
    async fn token_for(&self, to: &str) -> String {
        let sent = self.sent.lock().await;
        let email = sent
            .iter()
            .rev()
            .find(|e| e.to == to)
            .expect("no mail for recipient");
        let start = email.text.find("token=").expect("no token in mail") + "token=".len();
        email.text[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }

    async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}

struct DownMailer;

#[async_trait]
impl Mailer for DownMailer {
    async fn send(&self, _email: Email) -> Result<(), MailError> {
        Err(MailError::Rejected(503))
    }
}

struct BrokenSink;

#[async_trait]
impl ActivitySink for BrokenSink {
    async fn write(&self, _entry: &NewActivity) -> anyhow::Result<()> {
        anyhow::bail!("activity store offline")
    }
}

struct TestApp {
    router: Router,
    db: Database,
    mailer: Arc<RecordingMailer>,
    receipts_dir: TempDir,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(None, None).await
}

async fn spawn_app_with(
    mailer: Option<Arc<dyn Mailer>>,
    sink: Option<Arc<dyn ActivitySink>>,
) -> TestApp {
    spawn_app_in(AppEnv::Development, mailer, sink).await
}

async fn spawn_app_in(
    app_env: AppEnv,
    mailer: Option<Arc<dyn Mailer>>,
    sink: Option<Arc<dyn ActivitySink>>,
) -> TestApp {
    let receipts_dir = TempDir::new().unwrap();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let recording = Arc::new(RecordingMailer::default());
    let mailer = mailer.unwrap_or_else(|| recording.clone() as Arc<dyn Mailer>);

    let config = ServerConfig {
        app_env,
        ..ServerConfig::for_tests(receipts_dir.path())
    };
    let mut state = AppState::new(db.clone(), config, mailer);
    if let Some(sink) = sink {
        state = state.with_activity_sink(sink);
    }

    TestApp {
        router: build_router(state),
        db,
        mailer: recording,
        receipts_dir,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply {
            status,
            headers,
            bytes,
        }
    }

    async fn get(&self, uri: &str, token: &str) -> Reply {
        self.request(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    async fn signup(&self, name: &str, email: &str, password: &str) -> Reply {
        self.post(
            "/api/auth/signup",
            None,
            json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> Reply {
        self.post(
            "/api/auth/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Signs up, verifies through the mailed link and logs in.
    async fn verified_token(&self, name: &str, email: &str, password: &str) -> String {
        assert_eq!(self.signup(name, email, password).await.status, StatusCode::CREATED);
        let token = self.mailer.token_for(email).await;
        let verified = self
            .request(
                Method::GET,
                &format!("/api/auth/verify-email?token={token}"),
                None,
                None,
            )
            .await;
        assert_eq!(verified.status, StatusCode::OK);

        let login = self.login(email, password).await;
        assert_eq!(login.status, StatusCode::OK);
        login.json()["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.verified_token("Ada Admin", "admin@shop.test", "admin-pass-1")
            .await
    }

    async fn viewer_token(&self) -> String {
        self.db
            .users()
            .insert(&NewUser {
                name: "Vic Viewer".into(),
                email: "viewer@shop.test".into(),
                password_hash: hash_password("viewer-pass-1").unwrap(),
                role: Role::Viewer,
                is_verified: true,
                verification_token_hash: None,
                verification_expires_at: None,
            })
            .await
            .unwrap();
        let login = self.login("viewer@shop.test", "viewer-pass-1").await;
        login.json()["token"].as_str().unwrap().to_string()
    }

    async fn create_product(&self, token: &str, name: &str, price_cents: i64, quantity: i64) -> String {
        let reply = self
            .post(
                "/api/products",
                Some(token),
                json!({ "name": name, "price_cents": price_cents, "quantity": quantity }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        reply.json()["id"].as_str().unwrap().to_string()
    }

    async fn stock_of(&self, product_id: &str) -> i64 {
        self.db
            .products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    /// Waits for detached activity writes to land.
    async fn wait_for_activities(&self, at_least: i64) -> i64 {
        for _ in 0..100 {
            let count = self.db.activities().count().await.unwrap();
            if count >= at_least {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.db.activities().count().await.unwrap()
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let reply = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["database"], true);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_signup_verify_login_flow() {
    let app = spawn_app().await;

    let reply = app.signup("Ada", "Ada@Shop.Test", "admin-pass-1").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    assert_eq!(body["user"]["email"], "ada@shop.test");
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["is_verified"], false);
    assert!(body["user"].get("password_hash").is_none());

    // Unverified accounts cannot log in, even with the right password
    let reply = app.login("ada@shop.test", "admin-pass-1").await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["code"], "NOT_VERIFIED");

    let token = app.mailer.token_for("ada@shop.test").await;
    let reply = app
        .request(
            Method::GET,
            &format!("/api/auth/verify-email?token={token}"),
            None,
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["message"], "Email verified successfully");

    let reply = app.login("ada@shop.test", "admin-pass-1").await;
    assert_eq!(reply.status, StatusCode::OK);
    let jwt = reply.json()["token"].as_str().unwrap().to_string();

    let me = app.get("/api/auth/me", &jwt).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["email"], "ada@shop.test");
}

#[tokio::test]
async fn test_second_signup_is_cashier() {
    let app = spawn_app().await;
    app.admin_token().await;

    let reply = app.signup("Cal", "cal@shop.test", "cashier-pass").await;
    assert_eq!(reply.json()["user"]["role"], "cashier");
}

#[tokio::test]
async fn test_duplicate_signup_is_conflict() {
    let app = spawn_app().await;
    app.signup("Ada", "ada@shop.test", "admin-pass-1").await;

    let reply = app.signup("Other", "ADA@shop.test", "another-pass").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "CONFLICT");
}

#[tokio::test]
async fn test_signup_mail_failure_removes_account() {
    let app = spawn_app_with(Some(Arc::new(DownMailer)), None).await;

    let reply = app.signup("Ada", "ada@shop.test", "admin-pass-1").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["code"], "INTERNAL_ERROR");
    assert!(reply.json()["detail"]
        .as_str()
        .unwrap()
        .contains("verification email"));
    assert_eq!(app.db.users().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_production_hides_internal_cause() {
    let app = spawn_app_in(AppEnv::Production, Some(Arc::new(DownMailer)), None).await;

    let reply = app.signup("Ada", "ada@shop.test", "admin-pass-1").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = reply.json();
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["message"], "Internal server error");
    assert!(body.get("detail").is_none());
    assert!(!String::from_utf8_lossy(&reply.bytes).contains("503"));
}

#[tokio::test]
async fn test_verification_token_redeemed_twice() {
    let app = spawn_app().await;
    app.signup("Ada", "ada@shop.test", "admin-pass-1").await;
    let token = app.mailer.token_for("ada@shop.test").await;
    let uri = format!("/api/auth/verify-email?token={token}");

    let first = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.json()["message"], "Email already verified");
}

#[tokio::test]
async fn test_unknown_verification_token() {
    let app = spawn_app().await;
    let reply = app
        .request(Method::GET, "/api/auth/verify-email?token=nope", None, None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "INVALID_OR_EXPIRED_TOKEN");
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_are_identical() {
    let app = spawn_app().await;
    app.admin_token().await;

    let wrong_password = app.login("admin@shop.test", "not-the-password").await;
    let unknown_email = app.login("ghost@shop.test", "not-the-password").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.bytes, unknown_email.bytes);
    assert_eq!(wrong_password.json()["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = spawn_app().await;
    app.admin_token().await;

    let reply = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "admin@shop.test" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let token = app.mailer.token_for("admin@shop.test").await;

    let reply = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": token, "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    assert_eq!(
        app.login("admin@shop.test", "admin-pass-1").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("admin@shop.test", "brand-new-pass").await.status,
        StatusCode::OK
    );

    // Tokens are single use
    let reply = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": token, "password": "third-pass-123" }),
        )
        .await;
    assert_eq!(reply.json()["code"], "INVALID_OR_EXPIRED_TOKEN");
}

#[tokio::test]
async fn test_bad_reset_token_leaves_password() {
    let app = spawn_app().await;
    app.admin_token().await;
    let before = app
        .db
        .users()
        .find_by_email("admin@shop.test")
        .await
        .unwrap()
        .unwrap()
        .password_hash;

    let reply = app
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": "deadbeef", "password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "INVALID_OR_EXPIRED_TOKEN");

    let after = app
        .db
        .users()
        .find_by_email("admin@shop.test")
        .await
        .unwrap()
        .unwrap()
        .password_hash;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_forgot_password_is_generic() {
    let app = spawn_app().await;
    app.admin_token().await;
    let mails = app.mailer.count().await;

    let known = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "admin@shop.test" }),
        )
        .await;
    let unknown = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "ghost@shop.test" }),
        )
        .await;

    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(known.bytes, unknown.bytes);
    assert_eq!(app.mailer.count().await, mails + 1);
}

#[tokio::test]
async fn test_update_password_requires_current() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let reply = app
        .request(
            Method::PUT,
            "/api/auth/update-password",
            Some(&token),
            Some(json!({ "current_password": "wrong-one", "new_password": "next-pass-1" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .request(
            Method::PUT,
            "/api/auth/update-password",
            Some(&token),
            Some(json!({ "current_password": "admin-pass-1", "new_password": "next-pass-1" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        app.login("admin@shop.test", "next-pass-1").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_profile_email_conflict() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.signup("Cal", "cal@shop.test", "cashier-pass").await;

    let reply = app
        .request(
            Method::PUT,
            "/api/auth/profile",
            Some(&admin),
            Some(json!({ "email": "cal@shop.test" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "CONFLICT");

    let reply = app
        .request(
            Method::PUT,
            "/api/auth/profile",
            Some(&admin),
            Some(json!({ "name": "Ada Lovelace" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["user"]["name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = spawn_app().await;

    let missing = app.request(Method::GET, "/api/products", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let garbage = app.get("/api/products", "not.a.jwt").await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.bytes, garbage.bytes);
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let app = spawn_app().await;
    let reply = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": 42 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_product_crud_as_admin() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let id = app.create_product(&token, "Widget", 1000, 5).await;

    let reply = app
        .request(
            Method::PUT,
            &format!("/api/products/{id}"),
            Some(&token),
            Some(json!({ "price_cents": 1250 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["price_cents"], 1250);
    assert_eq!(reply.json()["name"], "Widget");

    let list = app.get("/api/products?search=widg", &token).await;
    assert_eq!(list.json().as_array().unwrap().len(), 1);

    let reply = app
        .request(Method::DELETE, &format!("/api/products/{id}"), Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let reply = app.get(&format!("/api/products/{id}"), &token).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_validation() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let reply = app
        .post(
            "/api/products",
            Some(&token),
            json!({ "name": "", "price_cents": 100, "quantity": 1 }),
        )
        .await;
    assert_eq!(reply.json()["code"], "VALIDATION_ERROR");

    let reply = app
        .post(
            "/api/products",
            Some(&token),
            json!({ "name": "Bad", "price_cents": -1, "quantity": 1 }),
        )
        .await;
    assert_eq!(reply.json()["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_viewer_cannot_mutate() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let product = app.create_product(&admin, "Widget", 1000, 5).await;
    let viewer = app.viewer_token().await;

    let reply = app
        .post(
            "/api/products",
            Some(&viewer),
            json!({ "name": "Nope", "price_cents": 100, "quantity": 1 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["code"], "FORBIDDEN");

    let reply = app
        .post(
            "/api/sales",
            Some(&viewer),
            json!({
                "items": [{ "product_id": product, "quantity": 1 }],
                "payment_method": "cash"
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(app.stock_of(&product).await, 5);

    // Reads are open to every role
    assert_eq!(app.get("/api/products", &viewer).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/dashboard/summary", &viewer).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.get("/api/activity", &viewer).await.status,
        StatusCode::FORBIDDEN
    );
}

// =============================================================================
// Checkout & receipts
// =============================================================================

#[tokio::test]
async fn test_checkout_records_sale_payment_and_receipt() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 5).await;

    let reply = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [{ "product_id": widget, "quantity": 2 }],
                "payment_method": "cash",
                "customer_name": "Jane Doe"
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());

    let body = reply.json();
    let sale_id = body["sale"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["sale"]["total_cents"], 2000);
    assert_eq!(body["sale"]["customer_name"], "Jane Doe");
    assert_eq!(body["sale"]["lines"][0]["product_name"], "Widget");
    assert_eq!(body["payment"]["amount_paid_cents"], 2000);
    assert_eq!(body["payment"]["sale_id"], sale_id.as_str());
    assert!(body["payment"]["transaction_id"]
        .as_str()
        .unwrap()
        .starts_with("TXN-"));

    assert_eq!(app.stock_of(&widget).await, 3);
    assert_eq!(app.db.payments().count().await.unwrap(), 1);

    let stored = std::fs::read(
        app.receipts_dir
            .path()
            .join(format!("receipt_{sale_id}.pdf")),
    )
    .unwrap();

    let download = app
        .get(&format!("/api/receipts/pdf/{sale_id}"), &token)
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download.headers[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert!(download.headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains(&format!("receipt_{sale_id}.pdf")));
    assert_eq!(download.bytes, stored);
    assert!(download.bytes.starts_with(b"%PDF"));

    let receipts = app.get("/api/receipts", &token).await.json();
    assert_eq!(receipts["total"], 1);
    assert_eq!(receipts["items"][0]["has_receipt"], true);

    // SIGNUP, VERIFY_EMAIL, LOGIN, CREATE_PRODUCT, CREATE_SALE,
    // GENERATE_RECEIPT, DOWNLOAD_RECEIPT
    app.wait_for_activities(7).await;
    let generated = app
        .get("/api/activity?action=GENERATE_RECEIPT", &token)
        .await
        .json();
    assert_eq!(generated["total"], 1);
    assert_eq!(generated["items"][0]["target"]["kind"], "sale");
    assert_eq!(generated["items"][0]["target"]["id"], sale_id.as_str());
}

#[tokio::test]
async fn test_insufficient_stock_changes_nothing() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let plenty = app.create_product(&token, "Plenty", 500, 10).await;
    let scarce = app.create_product(&token, "Scarce", 800, 1).await;

    let reply = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [
                    { "product_id": plenty, "quantity": 3 },
                    { "product_id": scarce, "quantity": 2 }
                ],
                "payment_method": "card"
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "INSUFFICIENT_STOCK");
    assert!(reply.json()["message"].as_str().unwrap().contains("Scarce"));

    assert_eq!(app.stock_of(&plenty).await, 10);
    assert_eq!(app.stock_of(&scarce).await, 1);
    assert_eq!(app.db.sales().count().await.unwrap(), 0);
    assert_eq!(app.db.payments().count().await.unwrap(), 0);
    assert_eq!(
        std::fs::read_dir(app.receipts_dir.path()).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart_and_unknown_product() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let reply = app
        .post(
            "/api/sales",
            Some(&token),
            json!({ "items": [], "payment_method": "cash" }),
        )
        .await;
    assert_eq!(reply.json()["code"], "VALIDATION_ERROR");

    let reply = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [{ "product_id": "00000000-0000-4000-8000-000000000000", "quantity": 1 }],
                "payment_method": "cash"
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_receipt_is_not_found() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let reply = app
        .get(
            "/api/receipts/pdf/0b9a5e0e-3f57-4e55-9d52-3c8f8f6f2a10",
            &token,
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_sale_removes_receipt() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 5).await;

    let reply = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [{ "product_id": widget, "quantity": 1 }],
                "payment_method": "upi"
            }),
        )
        .await;
    let sale_id = reply.json()["sale"]["id"].as_str().unwrap().to_string();

    let reply = app
        .request(Method::DELETE, &format!("/api/sales/{sale_id}"), Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    assert_eq!(app.stock_of(&widget).await, 4);
    assert_eq!(
        app.get(&format!("/api/receipts/pdf/{sale_id}"), &token)
            .await
            .status,
        StatusCode::NOT_FOUND
    );
}

// =============================================================================
// Payments & dashboard
// =============================================================================

#[tokio::test]
async fn test_fully_paid_sale_takes_no_payment() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 5).await;
    let sale = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [{ "product_id": widget, "quantity": 1 }],
                "payment_method": "cash"
            }),
        )
        .await
        .json();
    let sale_id = sale["sale"]["id"].as_str().unwrap();

    let reply = app
        .post(
            "/api/payments",
            Some(&token),
            json!({ "sale_id": sale_id, "amount_paid_cents": 1000, "payment_method": "card" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "CONFLICT");

    let listed = app
        .get(&format!("/api/payments?sale_id={sale_id}"), &token)
        .await
        .json();
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_partial_tender_is_settled_through_payments() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 5).await;

    let created = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [{ "product_id": widget, "quantity": 2 }],
                "payment_method": "cash",
                "amount_paid_cents": 500
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let body = created.json();
    assert_eq!(body["sale"]["total_cents"], 2000);
    assert_eq!(body["payment"]["amount_paid_cents"], 500);
    let sale_id = body["sale"]["id"].as_str().unwrap();

    let over = app
        .post(
            "/api/payments",
            Some(&token),
            json!({ "sale_id": sale_id, "amount_paid_cents": 1600, "payment_method": "card" }),
        )
        .await;
    assert_eq!(over.status, StatusCode::BAD_REQUEST);
    assert_eq!(over.json()["code"], "VALIDATION_ERROR");

    let settled = app
        .post(
            "/api/payments",
            Some(&token),
            json!({
                "sale_id": sale_id,
                "amount_paid_cents": 1500,
                "payment_method": "upi",
                "transaction_id": "UPI-77"
            }),
        )
        .await;
    assert_eq!(settled.status, StatusCode::CREATED, "{:?}", settled.json());
    assert_eq!(settled.json()["amount_paid_cents"], 1500);
    assert_eq!(settled.json()["transaction_id"], "UPI-77");

    let again = app
        .post(
            "/api/payments",
            Some(&token),
            json!({ "sale_id": sale_id, "amount_paid_cents": 1, "payment_method": "cash" }),
        )
        .await;
    assert_eq!(again.json()["code"], "CONFLICT");

    let listed = app
        .get(&format!("/api/payments?sale_id={sale_id}"), &token)
        .await
        .json();
    assert_eq!(listed["total"], 2);
}

#[tokio::test]
async fn test_tender_above_total_is_rejected() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 5).await;

    let reply = app
        .post(
            "/api/sales",
            Some(&token),
            json!({
                "items": [{ "product_id": widget, "quantity": 1 }],
                "payment_method": "cash",
                "amount_paid_cents": 1001
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], "VALIDATION_ERROR");
    assert_eq!(app.stock_of(&widget).await, 5);
}

#[tokio::test]
async fn test_dashboard_aggregates() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 10).await;
    let gadget = app.create_product(&token, "Gadget", 250, 10).await;

    for (product, qty, method) in [(&widget, 2, "cash"), (&gadget, 4, "card"), (&widget, 1, "cash")] {
        let reply = app
            .post(
                "/api/sales",
                Some(&token),
                json!({
                    "items": [{ "product_id": product, "quantity": qty }],
                    "payment_method": method
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let summary = app.get("/api/dashboard/summary", &token).await.json();
    assert_eq!(summary["total_products"], 2);
    assert_eq!(summary["total_sales"], 3);
    assert_eq!(summary["total_revenue_cents"], 4000);

    let top = app
        .get("/api/dashboard/top-products?limit=1", &token)
        .await
        .json();
    assert_eq!(top.as_array().unwrap().len(), 1);
    assert_eq!(top[0]["name"], "Gadget");
    assert_eq!(top[0]["quantity_sold"], 4);

    let methods = app.get("/api/dashboard/payment-methods", &token).await.json();
    assert_eq!(methods.as_array().unwrap().len(), 2);
}

// =============================================================================
// Activity log
// =============================================================================

#[tokio::test]
async fn test_activity_is_recorded_and_listed() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let widget = app.create_product(&token, "Widget", 1000, 5).await;

    // SIGNUP, VERIFY_EMAIL, LOGIN, CREATE_PRODUCT
    app.wait_for_activities(4).await;

    let page = app
        .get("/api/activity?action=CREATE_PRODUCT", &token)
        .await
        .json();
    assert_eq!(page["total"], 1);
    let entry = &page["items"][0];
    assert_eq!(entry["target"]["kind"], "product");
    assert_eq!(entry["target"]["id"], widget.as_str());
    assert_eq!(entry["metadata"]["status_code"], 201);
    assert_eq!(entry["metadata"]["path"], "/api/products");

    let id = entry["id"].as_str().unwrap();
    let detail = app.get(&format!("/api/activity/{id}"), &token).await.json();
    assert_eq!(detail["target_label"], "Widget");

    let reply = app
        .request(Method::DELETE, &format!("/api/activity/{id}"), Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get(&format!("/api/activity/{id}"), &token).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_client_can_post_activity() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let reply = app
        .post(
            "/api/activity",
            Some(&token),
            json!({ "action": "LOGOUT", "details": "Signed out", "metadata": { "screen": "pos" } }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    assert_eq!(body["action"], "LOGOUT");
    assert_eq!(body["target"]["kind"], "system");
    assert_eq!(body["metadata"]["screen"], "pos");
    assert_eq!(body["metadata"]["method"], "POST");
}

#[tokio::test]
async fn test_activity_sink_failure_does_not_change_response() {
    let healthy = spawn_app().await;
    let broken = spawn_app_with(None, Some(Arc::new(BrokenSink))).await;

    let healthy_token = healthy.admin_token().await;
    let broken_token = broken.admin_token().await;

    let ok = healthy
        .post(
            "/api/products",
            Some(&healthy_token),
            json!({ "name": "Widget", "price_cents": 1000, "quantity": 5 }),
        )
        .await;
    let still_ok = broken
        .post(
            "/api/products",
            Some(&broken_token),
            json!({ "name": "Widget", "price_cents": 1000, "quantity": 5 }),
        )
        .await;

    assert_eq!(ok.status, still_ok.status);
    assert_eq!(ok.json()["name"], still_ok.json()["name"]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(broken.db.activities().count().await.unwrap(), 0);
}
