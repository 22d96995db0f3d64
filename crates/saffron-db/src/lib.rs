//! # saffron-db: Local Storage for Saffron POS
//!
//! SQLite storage for orders in progress. The order screens write an entry
//! per table; the settlement removes it once the table is paid.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BillingOrchestrator ──► dyn OrderCache (saffron-billing port)         │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   saffron-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs) ──► SqliteOrderCache ──► order_cache      │   │
//! │  │   migrations/001_order_cache.sql (embedded)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │             <data_dir>/com.saffron.pos/orders.db                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use saffron_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new(config.cache.resolved_path())).await?;
//! let cache = Arc::new(db.order_cache());
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{CachedOrderRow, SqliteOrderCache};
