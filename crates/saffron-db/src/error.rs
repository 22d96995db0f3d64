//! # Database Error Types
//!
//! Error types for the local order cache store.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error) / serde_json::Error                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CacheError (saffron-billing port) ← What the settlement sees          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Recovered warning; the settlement itself still succeeds               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use saffron_billing::CacheError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate primary key outside an upsert
    #[error("Duplicate {field}: {value}")]
    UniqueViolation { field: String, value: String },

    /// A stored row could not be decoded back into a domain type.
    ///
    /// ## When This Occurs
    /// - Payload JSON written by an older build no longer matches `Order`
    /// - Manual edits to the database file
    #[error("Corrupt {entity} row {id}: {reason}")]
    Corrupt {
        entity: String,
        id: String,
        reason: String,
    },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file locked by another process
    /// - Disk full or permissions issue
    /// - Invalid database path
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Connection pool exhausted.
    ///
    /// ## When This Occurs
    /// - All connections in use and acquire timed out
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Serializing a value for storage failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected errors.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for an entity.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let message = db_err.message();

                if message.contains("UNIQUE constraint failed") {
                    let field = message
                        .split(':')
                        .nth(1)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    return DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    };
                }

                DbError::QueryFailed(message.to_string())
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Maps storage failures onto the cache port's error type.
///
/// A corrupt row keeps its table number so the warning names the table;
/// everything else is a backend failure.
impl From<DbError> for CacheError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Corrupt { id, reason, .. } => match id.parse::<u32>() {
                Ok(table_number) => CacheError::Corrupt {
                    table_number,
                    reason,
                },
                Err(_) => CacheError::Backend(format!("corrupt row {}: {}", id, reason)),
            },
            other => CacheError::Backend(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
