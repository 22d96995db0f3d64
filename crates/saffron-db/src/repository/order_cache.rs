//! # Order Cache Repository
//!
//! SQLite-backed store for orders in progress, one row per table.
//!
//! ## Row Layout
//! ```text
//! ┌──────────────┬──────────┬───────────┬──────────────────────┬────────────┐
//! │ table_number │ order_id │ status    │ payload (Order JSON) │ updated_at │
//! ├──────────────┼──────────┼───────────┼──────────────────────┼────────────┤
//! │ 4 (PK)       │ ord-77   │ served    │ {"id":"ord-77",...}  │ RFC 3339   │
//! └──────────────┴──────────┴───────────┴──────────────────────┴────────────┘
//! ```
//!
//! Writing an order for a table that already has one replaces it.

use async_trait::async_trait;
use chrono::Utc;
use saffron_billing::{CacheError, OrderCache};
use saffron_core::Order;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::{DbError, DbResult};

const ENTITY: &str = "CachedOrder";

/// Raw `order_cache` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CachedOrderRow {
    pub table_number: i64,
    pub order_id: String,
    pub status: String,
    pub payload: String,
    pub updated_at: String,
}

impl CachedOrderRow {
    /// Decodes the stored order.
    pub fn decode(&self) -> DbResult<Order> {
        serde_json::from_str(&self.payload).map_err(|e| DbError::Corrupt {
            entity: ENTITY.to_string(),
            id: self.table_number.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Repository for cached in-progress orders.
#[derive(Debug, Clone)]
pub struct SqliteOrderCache {
    pool: SqlitePool,
}

impl SqliteOrderCache {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteOrderCache { pool }
    }

    /// Looks up the order cached for a table.
    #[instrument(skip(self))]
    pub async fn get(&self, table_number: u32) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, CachedOrderRow>(
            r#"
            SELECT table_number, order_id, status, payload, updated_at
            FROM order_cache
            WHERE table_number = ?
            "#,
        )
        .bind(i64::from(table_number))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.decode()).transpose()
    }

    /// Inserts or replaces the order for its table.
    #[instrument(skip(self, order), fields(order_id = %order.id, table = order.table_number))]
    pub async fn put(&self, order: &Order) -> DbResult<()> {
        let payload = serde_json::to_string(order)?;

        sqlx::query(
            r#"
            INSERT INTO order_cache (table_number, order_id, status, payload, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(table_number) DO UPDATE SET
                order_id = excluded.order_id,
                status = excluded.status,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(i64::from(order.table_number))
        .bind(&order.id)
        .bind(order.status.as_str())
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Cached order in progress");
        Ok(())
    }

    /// Deletes the entry for a table. Returns whether one existed.
    #[instrument(skip(self))]
    pub async fn remove(&self, table_number: u32) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM order_cache WHERE table_number = ?")
            .bind(i64::from(table_number))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderCache for SqliteOrderCache {
    async fn get_in_progress(&self, table_number: u32) -> Result<Option<Order>, CacheError> {
        Ok(self.get(table_number).await?)
    }

    async fn put_in_progress(&self, order: &Order) -> Result<(), CacheError> {
        Ok(self.put(order).await?)
    }

    async fn remove_in_progress(&self, table_number: u32) -> Result<bool, CacheError> {
        Ok(self.remove(table_number).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
