//! Progress notifications for whoever started the settlement.
//!
//! A UI uses these to show the loading state on "Close & Print" and to
//! display warnings once the saga finishes.

use tracing::{info, warn};

use crate::error::RecoveredError;
use crate::state::SagaStep;

/// Receives progress of a running settlement.
pub trait SagaObserver: Send + Sync {
    /// Called on entry to every state, terminal ones included.
    fn on_step(&self, order_id: &str, step: SagaStep);

    /// Called when a post-payment step failed and the saga continued.
    fn on_warning(&self, order_id: &str, warning: &RecoveredError);
}

/// Observer that ignores everything.
pub struct NoOpObserver;

impl SagaObserver for NoOpObserver {
    fn on_step(&self, _order_id: &str, _step: SagaStep) {}
    fn on_warning(&self, _order_id: &str, _warning: &RecoveredError) {}
}

/// Observer that writes every step to the log.
pub struct TracingObserver;

impl SagaObserver for TracingObserver {
    fn on_step(&self, order_id: &str, step: SagaStep) {
        info!(order_id, step = %step, "Settlement step");
    }

    fn on_warning(&self, order_id: &str, warning: &RecoveredError) {
        warn!(order_id, warning = %warning, "Settlement warning");
    }
}
