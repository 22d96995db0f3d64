//! # In-Flight Guard
//!
//! At most one settlement per order at a time. A second press of
//! "Close & Print" while the first saga is still running fails fast instead
//! of racing it with fresh idempotency keys.
//!
//! ```text
//!  saga A: try_acquire("ord-7") ──► Some(ticket) ... drop(ticket) ──► released
//!  saga B: try_acquire("ord-7") ──► None  (AlreadyInProgress)
//!  saga C: try_acquire("ord-8") ──► Some(ticket)
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Set of order ids with a saga in progress. Cheap to clone; clones share
/// the same set.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    orders: Arc<Mutex<HashSet<String>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `order_id`, or returns `None` if another saga holds it.
    pub fn try_acquire(&self, order_id: &str) -> Option<InFlightTicket> {
        let inserted = self.lock().insert(order_id.to_string());
        if !inserted {
            debug!(order_id, "Settlement already in flight");
            return None;
        }
        Some(InFlightTicket {
            orders: Arc::clone(&self.orders),
            order_id: order_id.to_string(),
        })
    }

    pub fn is_held(&self, order_id: &str) -> bool {
        self.lock().contains(order_id)
    }

    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock cannot leave the set half-updated.
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.orders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the order when dropped.
#[derive(Debug)]
pub struct InFlightTicket {
    orders: Arc<Mutex<HashSet<String>>>,
    order_id: String,
}

impl InFlightTicket {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut orders = self.orders.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        orders.remove(&self.order_id);
    }
}
