//! # Repositories
//!
//! One repository per stored aggregate. Each owns a clone of the pool.
//!
//! - [`order_cache`] - Orders in progress, keyed by table number

pub mod order_cache;

pub use order_cache::{CachedOrderRow, SqliteOrderCache};
