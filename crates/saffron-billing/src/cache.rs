//! In-memory [`OrderCache`].
//!
//! Used when no SQLite path is configured and in tests. Contents are lost
//! when the process exits.

use async_trait::async_trait;
use saffron_core::Order;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::ports::OrderCache;

#[derive(Debug, Clone, Default)]
pub struct MemoryOrderCache {
    orders: Arc<RwLock<HashMap<u32, Order>>>,
}

impl MemoryOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderCache for MemoryOrderCache {
    async fn get_in_progress(&self, table_number: u32) -> Result<Option<Order>, CacheError> {
        Ok(self.orders.read().await.get(&table_number).cloned())
    }

    async fn put_in_progress(&self, order: &Order) -> Result<(), CacheError> {
        self.orders
            .write()
            .await
            .insert(order.table_number, order.clone());
        Ok(())
    }

    async fn remove_in_progress(&self, table_number: u32) -> Result<bool, CacheError> {
        Ok(self.orders.write().await.remove(&table_number).is_some())
    }
}
