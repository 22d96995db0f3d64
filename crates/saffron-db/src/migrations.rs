//! # Database Migrations
//!
//! Schema migrations embedded at compile time from `migrations/`.
//!
//! | File                      | Creates                          |
//! |---------------------------|----------------------------------|
//! | `001_order_cache.sql`     | `order_cache` table + indexes    |

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Embedded migrator. Paths are relative to this crate's `Cargo.toml`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies all pending migrations. Safe to call repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(
        embedded = MIGRATOR.iter().count(),
        "Checking for pending migrations"
    );

    MIGRATOR.run(pool).await?;

    info!("Database schema is up to date");
    Ok(())
}

/// Versions of the migrations already applied, oldest first.
pub async fn applied_versions(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let versions = sqlx::query_scalar::<_, i64>(
        "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
    )
    .fetch_all(pool)
    .await?;

    Ok(versions)
}
