//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  lines[]        │   │  sale_id (FK)   │       │
//! │  │  price_cents    │   │  total_cents    │   │  amount_paid    │       │
//! │  │  quantity       │   │  payment_method │   │  transaction_id │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     User        │   │    Activity     │   │ ActivityTarget  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  email (unique) │   │  user_id        │   │  Product(id)    │       │
//! │  │  role           │   │  action         │   │  Sale(id)       │       │
//! │  │  is_verified    │   │  target ────────┼──►│  Payment(id)    │       │
//! │  └─────────────────┘   │  status         │   │  User(id)       │       │
//! │                        └─────────────────┘   │  System         │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Secrets (password hash, one-time token hashes) never appear on these types;
//! they live on the database layer's own row structs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub description: Option<String>,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Quantity-on-hand. Never negative.
    pub quantity: i64,

    pub category: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks if `quantity` units can be taken from stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid for.
///
/// The web client historically sent display labels ("Cash", "UPI",
/// "Bank Transfer"); those are accepted as aliases on input.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(alias = "Cash")]
    Cash,
    #[serde(alias = "Card")]
    Card,
    #[serde(alias = "UPI", alias = "Upi")]
    Upi,
    #[serde(alias = "Bank Transfer", alias = "BankTransfer")]
    BankTransfer,
}

impl PaymentMethod {
    /// Human-readable label printed on receipts.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::BankTransfer => "Bank Transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Σ quantity × unit_price_cents over the lines, fixed at creation.
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    /// User who rang up the sale.
    pub cashier_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item in a sale.
/// `unit_price_cents` is the price-at-sale snapshot; later product edits
/// never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub sale_id: String,
    /// Zero-based position in the submitted cart.
    pub position: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl SaleLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// A sale line with the product name resolved for display.
///
/// `product_name` is `None` when the product has since been deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLineDetail {
    pub position: i64,
    pub product_id: String,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// A sale together with its ordered lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub lines: Vec<SaleLineDetail>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment against a sale. Checkout creates exactly one per sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub amount_paid_cents: i64,
    pub payment_method: PaymentMethod,
    /// Generated for checkout payments, supplied by the client otherwise.
    pub transaction_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }
}

// =============================================================================
// Users & Roles
// =============================================================================

/// Authorization role.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cashier,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "cashier" => Ok(Role::Cashier),
            "viewer" => Ok(Role::Viewer),
            _ => Err(crate::error::ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["admin".into(), "cashier".into(), "viewer".into()],
            }),
        }
    }
}

/// Public view of an account. Carries no credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

// =============================================================================
// Activity Log
// =============================================================================

/// Kind of action recorded in the audit log.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Login,
    Logout,
    Signup,
    VerifyEmail,
    ForgotPassword,
    ResetPassword,
    UpdateProfile,
    UpdatePassword,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    CreateSale,
    DeleteSale,
    CreatePayment,
    GenerateReceipt,
    DownloadReceipt,
    ViewDashboard,
    DeleteActivity,
    Other,
}

/// Outcome of the recorded action.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Success,
    Failed,
    Pending,
}

/// Entity kind an activity refers to. Stored alongside the target id.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Product,
    Sale,
    Payment,
    User,
    System,
}

/// What an activity was performed on.
///
/// Serialized as `{"kind": "sale", "id": "..."}`; `System` carries no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ActivityTarget {
    Product(String),
    Sale(String),
    Payment(String),
    User(String),
    System,
}

impl ActivityTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            ActivityTarget::Product(_) => TargetKind::Product,
            ActivityTarget::Sale(_) => TargetKind::Sale,
            ActivityTarget::Payment(_) => TargetKind::Payment,
            ActivityTarget::User(_) => TargetKind::User,
            ActivityTarget::System => TargetKind::System,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ActivityTarget::Product(id)
            | ActivityTarget::Sale(id)
            | ActivityTarget::Payment(id)
            | ActivityTarget::User(id) => Some(id),
            ActivityTarget::System => None,
        }
    }

    /// Rebuilds a target from its stored columns.
    ///
    /// An entity kind stored without an id degrades to `System`.
    pub fn from_parts(kind: TargetKind, id: Option<String>) -> Self {
        match (kind, id) {
            (TargetKind::Product, Some(id)) => ActivityTarget::Product(id),
            (TargetKind::Sale, Some(id)) => ActivityTarget::Sale(id),
            (TargetKind::Payment, Some(id)) => ActivityTarget::Payment(id),
            (TargetKind::User, Some(id)) => ActivityTarget::User(id),
            _ => ActivityTarget::System,
        }
    }
}

/// A recorded audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub action: ActivityAction,
    pub target: ActivityTarget,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: ActivityStatus,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: serde_json::Value,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An audit entry about to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub user_id: String,
    pub action: ActivityAction,
    pub target: ActivityTarget,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: ActivityStatus,
    pub metadata: serde_json::Value,
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSummary {
    pub total_products: i64,
    pub total_sales: i64,
    pub total_revenue_cents: i64,
}

/// Sales grouped by payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethodBreakdown {
    pub payment_method: PaymentMethod,
    pub sale_count: i64,
    pub total_cents: i64,
}

/// A best-selling product. `name` is `None` for deleted products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: Option<String>,
    pub quantity_sold: i64,
    pub revenue_cents: i64,
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Requested page, normalized so `page >= 1` and `1 <= per_page <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn into_page<T>(self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_accepts_legacy_labels() {
        let m: PaymentMethod = serde_json::from_str("\"Bank Transfer\"").unwrap();
        assert_eq!(m, PaymentMethod::BankTransfer);
        let m: PaymentMethod = serde_json::from_str("\"UPI\"").unwrap();
        assert_eq!(m, PaymentMethod::Upi);
        let m: PaymentMethod = serde_json::from_str("\"card\"").unwrap();
        assert_eq!(m, PaymentMethod::Card);
        assert_eq!(serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(), "\"bank_transfer\"");
        assert_eq!(PaymentMethod::Upi.to_string(), "UPI");
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Admin, Role::Cashier, Role::Viewer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_activity_target_is_tagged() {
        let target = ActivityTarget::Sale("s-1".to_string());
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "sale", "id": "s-1"}));

        let system = serde_json::to_value(ActivityTarget::System).unwrap();
        assert_eq!(system, serde_json::json!({"kind": "system"}));
    }

    #[test]
    fn test_activity_target_from_parts() {
        let t = ActivityTarget::from_parts(TargetKind::Product, Some("p-1".into()));
        assert_eq!(t.kind(), TargetKind::Product);
        assert_eq!(t.id(), Some("p-1"));

        let degraded = ActivityTarget::from_parts(TargetKind::User, None);
        assert_eq!(degraded, ActivityTarget::System);
    }

    #[test]
    fn test_action_serializes_screaming_snake() {
        let json = serde_json::to_string(&ActivityAction::CreateSale).unwrap();
        assert_eq!(json, "\"CREATE_SALE\"");
    }

    #[test]
    fn test_page_request_normalizes() {
        let req = PageRequest::new(Some(0), Some(500));
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 100);
        assert_eq!(req.offset(), 0);

        let req = PageRequest::new(Some(3), Some(10));
        assert_eq!(req.offset(), 20);
        assert_eq!(req.limit(), 10);
        assert_eq!(PageRequest::default().per_page, 20);
    }

    #[test]
    fn test_sale_line_total() {
        let line = SaleLine {
            sale_id: "s".into(),
            position: 0,
            product_id: "p".into(),
            quantity: 3,
            unit_price_cents: 299,
        };
        assert_eq!(line.line_total().cents(), 897);
    }
}
