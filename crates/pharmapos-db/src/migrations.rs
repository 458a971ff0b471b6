//! # Database Migrations
//!
//! Embedded SQL migrations for PharmaPOS.
//!
//! Migrations live in `migrations/sqlite/` at the workspace root and are
//! compiled into the binary by `sqlx::migrate!` — no runtime file access.
//! Applied migrations are tracked in the `_sqlx_migrations` table, so the
//! application can assume a fixed schema version after startup instead of
//! branching on column existence per query.
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file with the next sequence number:
//!    `NNN_description.sql` (e.g. `002_add_customer_table.sql`)
//! 2. Write idempotent SQL (use `IF NOT EXISTS` where possible)
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// ## Safety
/// - Idempotent: safe to run multiple times
/// - Transactional: each migration runs in a transaction
/// - Ordered: migrations run in filename order (001, 002, ...)
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns (total_migrations, applied_migrations), for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
