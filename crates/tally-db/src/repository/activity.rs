//! # Activity Repository
//!
//! Append-only audit log storage.
//!
//! ## Storage Shape
//! ```text
//! ActivityTarget::Sale("abc")   ──►  target_kind = 'sale',   target_id = 'abc'
//! ActivityTarget::System        ──►  target_kind = 'system', target_id = NULL
//! metadata (JSON object)        ──►  metadata TEXT
//! ```
//!
//! Rows carry no foreign keys, so an entry outlives the user or entity it
//! mentions. Resolving a human-readable label for the target is a separate,
//! best-effort lookup ([`ActivityRepository::resolve_target_label`]).

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, now};
use tally_core::{
    Activity, ActivityAction, ActivityStatus, ActivityTarget, Money, NewActivity, Page,
    PageRequest, TargetKind,
};

const ACTIVITY_COLUMNS: &str = "id, user_id, action, target_kind, target_id, details, \
     ip_address, user_agent, status, metadata, created_at";

/// Listing filter. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub user_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub target_kind: Option<TargetKind>,
    pub status: Option<ActivityStatus>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: String,
    user_id: String,
    action: ActivityAction,
    target_kind: TargetKind,
    target_id: Option<String>,
    details: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    status: ActivityStatus,
    metadata: String,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        let metadata = serde_json::from_str(&row.metadata).unwrap_or_else(|e| {
            warn!(activity_id = %row.id, error = %e, "Unreadable activity metadata");
            serde_json::Value::Object(Default::default())
        });

        Activity {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            target: ActivityTarget::from_parts(row.target_kind, row.target_id),
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            status: row.status,
            metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ActivityRepository { pool }
    }

    pub async fn insert(&self, new: &NewActivity) -> DbResult<Activity> {
        let id = generate_id();
        let created_at = now();
        let metadata = serde_json::to_string(&new.metadata)
            .map_err(|e| DbError::Internal(format!("Failed to encode metadata: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO activities (
                id, user_id, action, target_kind, target_id, details,
                ip_address, user_agent, status, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&id)
        .bind(&new.user_id)
        .bind(new.action)
        .bind(new.target.kind())
        .bind(new.target.id())
        .bind(&new.details)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .bind(new.status)
        .bind(&metadata)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        debug!(activity_id = %id, action = ?new.action, "Activity recorded");

        Ok(Activity {
            id,
            user_id: new.user_id.clone(),
            action: new.action,
            target: new.target.clone(),
            details: new.details.clone(),
            ip_address: new.ip_address.clone(),
            user_agent: new.user_agent.clone(),
            status: new.status,
            metadata: new.metadata.clone(),
            created_at,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Activity>> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1");
        let row = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Activity::from))
    }

    /// Filtered listing, newest first.
    pub async fn list(&self, filter: &ActivityFilter, page: PageRequest) -> DbResult<Page<Activity>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE 1 = 1"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<ActivityRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM activities WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(page.into_page(rows.into_iter().map(Activity::from).collect(), total))
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM activities WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Activity", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Human-readable label for a target, or `None` when it no longer exists.
    pub async fn resolve_target_label(&self, target: &ActivityTarget) -> DbResult<Option<String>> {
        let label = match target {
            ActivityTarget::Product(id) => {
                sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            ActivityTarget::Sale(id) => {
                sqlx::query_scalar::<_, i64>("SELECT total_cents FROM sales WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(|cents| format!("Sale of {}", Money::from_cents(cents)))
            }
            ActivityTarget::Payment(id) => sqlx::query_as::<_, (i64, String)>(
                "SELECT amount_paid_cents, payment_method FROM payments WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|(cents, method)| format!("Payment of {} ({})", Money::from_cents(cents), method)),
            ActivityTarget::User(id) => {
                sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            ActivityTarget::System => Some("System".to_string()),
        };
        Ok(label)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ActivityFilter) {
    if let Some(user_id) = &filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(action) = filter.action {
        query.push(" AND action = ").push_bind(action);
    }
    if let Some(kind) = filter.target_kind {
        query.push(" AND target_kind = ").push_bind(kind);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.from {
        query.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND created_at <= ").push_bind(to);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::NewProduct;
    use crate::{Database, DbConfig};
    use serde_json::json;

    fn entry(user: &str, action: ActivityAction, target: ActivityTarget) -> NewActivity {
        NewActivity {
            user_id: user.to_string(),
            action,
            target,
            details: "test".into(),
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("tests".into()),
            status: ActivityStatus::Success,
            metadata: json!({"method": "POST", "path": "/api/products", "status_code": 201}),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip_target() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.activities();

        let created = repo
            .insert(&entry("u1", ActivityAction::CreateSale, ActivityTarget::Sale("s1".into())))
            .await
            .unwrap();
        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched.target, ActivityTarget::Sale("s1".into()));
        assert_eq!(fetched.metadata["status_code"], 201);
        assert_eq!(fetched, created);

        let system = repo
            .insert(&entry("u1", ActivityAction::Other, ActivityTarget::System))
            .await
            .unwrap();
        let fetched = repo.get_by_id(&system.id).await.unwrap().unwrap();
        assert_eq!(fetched.target, ActivityTarget::System);
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.activities();

        for i in 0..5 {
            repo.insert(&entry("u1", ActivityAction::Login, ActivityTarget::User(format!("u{i}"))))
                .await
                .unwrap();
        }
        let mut failed = entry("u2", ActivityAction::CreateProduct, ActivityTarget::System);
        failed.status = ActivityStatus::Failed;
        repo.insert(&failed).await.unwrap();

        let all = repo
            .list(&ActivityFilter::default(), PageRequest::new(Some(1), Some(4)))
            .await
            .unwrap();
        assert_eq!(all.total, 6);
        assert_eq!(all.items.len(), 4);

        let second = repo
            .list(&ActivityFilter::default(), PageRequest::new(Some(2), Some(4)))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);

        let logins = repo
            .list(
                &ActivityFilter {
                    action: Some(ActivityAction::Login),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(logins.total, 5);

        let failures = repo
            .list(
                &ActivityFilter {
                    user_id: Some("u2".into()),
                    status: Some(ActivityStatus::Failed),
                    target_kind: Some(TargetKind::System),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(failures.total, 1);

        let future = repo
            .list(
                &ActivityFilter {
                    from: Some(Utc::now() + chrono::Duration::hours(1)),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(future.total, 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.activities();
        let created = repo
            .insert(&entry("u1", ActivityAction::Logout, ActivityTarget::System))
            .await
            .unwrap();

        repo.delete(&created.id).await.unwrap();
        assert!(repo.get_by_id(&created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&created.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_resolve_target_label() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Widget".into(),
                description: None,
                price_cents: 100,
                quantity: 1,
                category: None,
            })
            .await
            .unwrap();
        let repo = db.activities();

        let label = repo
            .resolve_target_label(&ActivityTarget::Product(product.id))
            .await
            .unwrap();
        assert_eq!(label.as_deref(), Some("Widget"));

        let missing = repo
            .resolve_target_label(&ActivityTarget::Sale("gone".into()))
            .await
            .unwrap();
        assert_eq!(missing, None);

        let system = repo.resolve_target_label(&ActivityTarget::System).await.unwrap();
        assert_eq!(system.as_deref(), Some("System"));
    }
}
