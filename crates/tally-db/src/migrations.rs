//! # Schema Migrations
//!
//! The SQL under `migrations/sqlite/` is compiled into the binary, so the
//! server and the `seed` tool never look for files at runtime.
//!
//! ```text
//! 001_initial_schema.sql   products, users, sales, sale_lines, payments,
//!                          activities + indexes
//! ```
//!
//! Files are append-only. A change to an applied migration makes sqlx
//! refuse to start because the recorded checksum no longer matches.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever has not been applied yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    debug!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((MIGRATOR.migrations.len(), usize::try_from(applied).unwrap_or(0)))
}
