//! # Billing Orchestrator
//!
//! Runs one table settlement from the permission check to the receipt.
//!
//! ## Step Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Step                   Remote call                 On failure          │
//! │  ────────────────────   ─────────────────────────   ─────────────────── │
//! │  CheckingPermission     none                        FATAL (no calls)    │
//! │  (pre-flight)           none                        FATAL (no calls)    │
//! │  EnsuringOrderServed    update_order_status         FATAL               │
//! │  CreatingBill           create_bill   (bill key)    FATAL               │
//! │  ProcessingPayment      process_payment (pay key)   FATAL, table stays  │
//! │  UpdatingTable          [list_tables] update_table  warning             │
//! │  InvalidatingCache      cache.remove_in_progress    warning             │
//! │  EmittingReceipt        receipts.emit               warning             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps run strictly one after another. Nothing is retried here: a retry
//! is a new call to [`BillingOrchestrator::close_table`] with new keys.

use saffron_core::{
    authorize, find_table_id, Actor, KeySource, OrderStatus, RandomKeySource, TableStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::BillingSettings;
use crate::context::{CloseTableRequest, TransactionContext};
use crate::error::{RecoveredError, SagaError};
use crate::guard::InFlightGuard;
use crate::observer::{NoOpObserver, SagaObserver};
use crate::ports::{BillingRemote, OrderCache, PaymentRequest, ReceiptEmitter};
use crate::state::{SagaState, SagaStep, Settlement, StepEvent};

// =============================================================================
// Run Report
// =============================================================================

/// What happened during one call to [`BillingOrchestrator::close_table`].
#[derive(Debug, Clone)]
pub struct SagaRun {
    pub order_id: String,
    /// `Succeeded` or `Failed`.
    pub state: SagaState,
    /// Post-payment failures that did not stop the saga.
    pub warnings: Vec<RecoveredError>,
    /// Every state entered, in order.
    pub trail: Vec<SagaStep>,
    /// How long the UI should show success before navigating away.
    /// `None` unless the saga succeeded.
    pub redirect_after: Option<Duration>,
}

impl SagaRun {
    pub fn is_success(&self) -> bool {
        matches!(self.state, SagaState::Succeeded(_))
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.state {
            SagaState::Succeeded(settlement) => Some(settlement),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SagaError> {
        match &self.state {
            SagaState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Warnings staff should see even though the settlement went through.
    pub fn user_warnings(&self) -> impl Iterator<Item = &RecoveredError> {
        self.warnings.iter().filter(|w| w.is_user_visible())
    }

    pub fn visited(&self, step: SagaStep) -> bool {
        self.trail.contains(&step)
    }

    pub fn into_result(self) -> Result<Settlement, SagaError> {
        match self.state {
            SagaState::Succeeded(settlement) => Ok(settlement),
            SagaState::Failed(err) => Err(err),
            other => Err(SagaError::OutOfOrder {
                state: other.step().as_str(),
                event: "finish",
            }),
        }
    }
}

/// Mutable bookkeeping for a run in progress.
struct Run<'a> {
    order_id: String,
    state: SagaState,
    warnings: Vec<RecoveredError>,
    trail: Vec<SagaStep>,
    observer: &'a dyn SagaObserver,
}

impl<'a> Run<'a> {
    fn new(order_id: String, observer: &'a dyn SagaObserver) -> Self {
        observer.on_step(&order_id, SagaStep::Idle);
        Run {
            order_id,
            state: SagaState::Idle,
            warnings: Vec::new(),
            trail: vec![SagaStep::Idle],
            observer,
        }
    }

    fn apply(&mut self, event: StepEvent) {
        let current = std::mem::replace(&mut self.state, SagaState::Idle);
        let transition = current.advance(event);

        if let Some(warning) = transition.warning {
            warn!(order_id = %self.order_id, warning = %warning, "Settlement step failed, continuing");
            self.observer.on_warning(&self.order_id, &warning);
            self.warnings.push(warning);
        }

        self.state = transition.next;
        let step = self.state.step();
        self.trail.push(step);
        self.observer.on_step(&self.order_id, step);

        match &self.state {
            SagaState::Failed(err) => {
                error!(order_id = %self.order_id, code = err.code(), error = %err, "Settlement failed");
            }
            SagaState::Succeeded(settlement) => {
                info!(
                    order_id = %self.order_id,
                    bill_id = %settlement.bill.id,
                    total = %settlement.bill.total,
                    table_freed = settlement.table_freed,
                    warnings = self.warnings.len(),
                    "Table settled"
                );
            }
            _ => debug!(order_id = %self.order_id, step = %step, "Settlement step"),
        }
    }

    fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    fn finish(self, redirect_delay: Duration) -> SagaRun {
        let redirect_after = matches!(self.state, SagaState::Succeeded(_)).then_some(redirect_delay);
        SagaRun {
            order_id: self.order_id,
            state: self.state,
            warnings: self.warnings,
            trail: self.trail,
            redirect_after,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Closes tables. One instance is shared by every settlement in the process
/// so that the in-flight guard sees all of them.
pub struct BillingOrchestrator {
    remote: Arc<dyn BillingRemote>,
    cache: Arc<dyn OrderCache>,
    receipts: Arc<dyn ReceiptEmitter>,
    keys: Arc<dyn KeySource>,
    observer: Arc<dyn SagaObserver>,
    guard: InFlightGuard,
    settings: BillingSettings,
}

impl BillingOrchestrator {
    pub fn new(
        remote: Arc<dyn BillingRemote>,
        cache: Arc<dyn OrderCache>,
        receipts: Arc<dyn ReceiptEmitter>,
        settings: BillingSettings,
    ) -> Self {
        BillingOrchestrator {
            remote,
            cache,
            receipts,
            keys: Arc::new(RandomKeySource),
            observer: Arc::new(NoOpObserver),
            guard: InFlightGuard::new(),
            settings,
        }
    }

    pub fn with_key_source(mut self, keys: Arc<dyn KeySource>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SagaObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Shares an existing guard, e.g. between two orchestrators in one
    /// process.
    pub fn with_guard(mut self, guard: InFlightGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    /// Settles the order in `request` on behalf of `actor`.
    ///
    /// Never panics and never returns early with a bare error: the outcome,
    /// including fatal failures, is in the returned [`SagaRun`].
    pub async fn close_table(&self, actor: &Actor, request: &CloseTableRequest) -> SagaRun {
        let mut run = Run::new(request.order.id.clone(), self.observer.as_ref());
        let redirect_delay = self.settings.redirect_delay();

        info!(
            order_id = %request.order.id,
            table_number = request.order.table_number,
            user_id = %actor.user_id,
            role = %actor.role,
            method = %request.method,
            "Closing table"
        );

        run.apply(StepEvent::Started);

        let required = self.settings.billing_roles();
        let authorization = authorize(&actor.role, &required);
        run.apply(StepEvent::PermissionChecked {
            authorization,
            required,
        });
        if run.is_done() {
            return run.finish(redirect_delay);
        }

        let ctx = match TransactionContext::begin(request, self.keys.as_ref()) {
            Ok(ctx) => ctx,
            Err(err) => {
                run.apply(StepEvent::Aborted(err));
                return run.finish(redirect_delay);
            }
        };

        let _ticket = match self.guard.try_acquire(ctx.order_id()) {
            Some(ticket) => ticket,
            None => {
                run.apply(StepEvent::Aborted(SagaError::AlreadyInProgress {
                    order_id: ctx.order_id().to_string(),
                }));
                return run.finish(redirect_delay);
            }
        };

        debug!(
            order_id = ctx.order_id(),
            bill_key = %ctx.bill_key(),
            payment_key = %ctx.payment_key(),
            "Settlement keys drawn"
        );

        while !run.is_done() {
            let event = self.perform(&run.state, &ctx).await;
            run.apply(event);
        }

        run.finish(redirect_delay)
    }

    /// Performs the side effect of `state` and reports its outcome.
    async fn perform(&self, state: &SagaState, ctx: &TransactionContext) -> StepEvent {
        match state {
            SagaState::EnsuringOrderServed => {
                if ctx.order_status() == OrderStatus::Served {
                    return StepEvent::OrderAlreadyServed;
                }
                debug!(order_id = ctx.order_id(), from = %ctx.order_status(), "Marking order served");
                let result = self
                    .remote
                    .update_order_status(ctx.order_id(), OrderStatus::Served)
                    .await;
                StepEvent::OrderStatusUpdated {
                    order_id: ctx.order_id().to_string(),
                    result,
                }
            }

            SagaState::CreatingBill => {
                debug!(order_id = ctx.order_id(), key = %ctx.bill_key(), "Creating bill");
                let result = self.remote.create_bill(ctx.order_id(), ctx.bill_key()).await;
                if let Ok(bill) = &result {
                    info!(order_id = ctx.order_id(), bill_id = %bill.id, total = %bill.total, paid = bill.paid, "Bill created");
                }
                StepEvent::BillCreated {
                    order_id: ctx.order_id().to_string(),
                    result,
                }
            }

            SagaState::ProcessingPayment { bill } => {
                let request = PaymentRequest {
                    bill_id: bill.id.clone(),
                    idempotency_key: ctx.payment_key().clone(),
                    method: ctx.method(),
                    transaction_ref: ctx.transaction_ref().map(str::to_string),
                    gateway_result: ctx.gateway_result().cloned(),
                };
                debug!(bill_id = %bill.id, key = %request.idempotency_key, method = %request.method, "Processing payment");
                let result = self.remote.process_payment(&request).await;
                if let Ok(payment) = &result {
                    info!(bill_id = %bill.id, payment_id = %payment.id, amount = %payment.amount, "Payment recorded");
                }
                StepEvent::PaymentProcessed(result)
            }

            SagaState::UpdatingTable { .. } => self.free_table(ctx).await,

            SagaState::InvalidatingCache { .. } => {
                let result = self.cache.remove_in_progress(ctx.table_number()).await;
                if let Ok(removed) = &result {
                    debug!(table_number = ctx.table_number(), removed = *removed, "Cached order cleared");
                }
                StepEvent::CacheInvalidated {
                    table_number: ctx.table_number(),
                    result,
                }
            }

            SagaState::EmittingReceipt { bill, payment, .. } => {
                let result = self
                    .receipts
                    .emit(bill, payment.as_ref())
                    .await
                    .map_err(|e| e.to_string());
                StepEvent::ReceiptEmitted(result)
            }

            other => StepEvent::Aborted(SagaError::OutOfOrder {
                state: other.step().as_str(),
                event: "perform",
            }),
        }
    }

    /// Resolves the table id (context, then the remote table list) and
    /// marks the table available.
    async fn free_table(&self, ctx: &TransactionContext) -> StepEvent {
        let label = format!("#{}", ctx.table_number());

        let table_id = match ctx.table_id() {
            Some(id) => id.to_string(),
            None => {
                debug!(table_number = ctx.table_number(), "Looking up table id");
                let tables = match self.remote.list_tables().await {
                    Ok(tables) => tables,
                    Err(e) => {
                        return StepEvent::TableNotFreed {
                            table: label,
                            reason: format!("table lookup failed: {}", e),
                        }
                    }
                };
                match find_table_id(&tables, ctx.table_number()) {
                    Some(id) => id.to_string(),
                    None => {
                        return StepEvent::TableNotFreed {
                            table: label,
                            reason: "no table with this number".into(),
                        }
                    }
                }
            }
        };

        match self
            .remote
            .update_table_status(&table_id, TableStatus::Available)
            .await
        {
            Ok(table) => {
                info!(table_id = %table.id, table_number = table.table_number, "Table freed");
                StepEvent::TableFreed(table)
            }
            Err(e) => StepEvent::TableNotFreed {
                table: table_id,
                reason: e.to_string(),
            },
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryOrderCache;
    use crate::error::RemoteError;
    use crate::testing::{
        FailPoint, FailingOrderCache, FakeRemote, RecordingEmitter, RecordingObserver, RemoteCall,
        SequentialKeySource,
    };
    use saffron_core::{
        BillInputs, Money, Order, OrderItem, PaymentMethod, Rate, Role, Table, BILLING_ROLES,
    };

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn order(status: OrderStatus) -> Order {
        Order {
            id: "ord-1".into(),
            table_number: 4,
            items: vec![
                OrderItem::new("Paneer Tikka", 2, Money::from_major_minor(100, 0)),
                OrderItem::new("Lassi", 1, Money::from_major_minor(50, 0)),
            ],
            status,
            discount: Some(Money::from_major_minor(20, 0)),
            subtotal: None,
            tax: None,
        }
    }

    fn tables() -> Vec<Table> {
        vec![
            Table { id: "t-1".into(), table_number: 1, status: TableStatus::Available },
            Table { id: "t-4".into(), table_number: 4, status: TableStatus::Occupied },
        ]
    }

    fn remote(status: OrderStatus) -> Arc<FakeRemote> {
        Arc::new(
            FakeRemote::new()
                .with_order(order(status))
                .with_tables(tables())
                .with_bill_inputs(BillInputs::new().tax(Rate::from_bps(500))),
        )
    }

    fn cashier() -> Actor {
        Actor::new("u-1", Role::Cashier)
    }

    struct Harness {
        remote: Arc<FakeRemote>,
        cache: Arc<MemoryOrderCache>,
        receipts: Arc<RecordingEmitter>,
        observer: Arc<RecordingObserver>,
        orchestrator: BillingOrchestrator,
    }

    fn harness_with(remote: Arc<FakeRemote>, receipts: Arc<RecordingEmitter>) -> Harness {
        let cache = Arc::new(MemoryOrderCache::new());
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = BillingOrchestrator::new(
            remote.clone(),
            cache.clone(),
            receipts.clone(),
            BillingSettings::default(),
        )
        .with_key_source(Arc::new(SequentialKeySource::default()))
        .with_observer(observer.clone());
        Harness {
            remote,
            cache,
            receipts,
            observer,
            orchestrator,
        }
    }

    fn harness(status: OrderStatus) -> Harness {
        harness_with(remote(status), Arc::new(RecordingEmitter::new()))
    }

    fn cash_request(status: OrderStatus) -> CloseTableRequest {
        CloseTableRequest::new(order(status), PaymentMethod::Cash).with_known_tables(tables())
    }

    // -------------------------------------------------------------------------
    // Happy path
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_full_settlement() {
        let h = harness(OrderStatus::Ready);
        h.cache.put_in_progress(&order(OrderStatus::Ready)).await.unwrap();

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Ready))
            .await;

        assert!(run.is_success(), "unexpected {:?}", run.state);
        assert!(run.warnings.is_empty());
        assert_eq!(run.redirect_after, Some(Duration::from_millis(1500)));
        assert_eq!(
            h.remote.call_names(),
            vec![
                "update_order_status",
                "create_bill",
                "process_payment",
                "update_table_status"
            ]
        );

        let settlement = run.settlement().unwrap();
        assert!(settlement.bill.paid);
        assert!(settlement.table_freed);
        assert_eq!(settlement.bill.total, Money::from_cents(24250));
        assert_eq!(settlement.payment.as_ref().map(|p| p.amount), Some(Money::from_cents(24250)));

        assert_eq!(h.remote.table("t-4").unwrap().status, TableStatus::Available);
        assert_eq!(h.remote.order("ord-1").unwrap().status, OrderStatus::Served);
        assert!(h.cache.get_in_progress(4).await.unwrap().is_none());
        assert_eq!(h.receipts.emitted().len(), 1);
        assert_eq!(h.observer.steps(), run.trail);
    }

    #[tokio::test]
    async fn test_keys_are_sent_with_mutations() {
        let h = harness(OrderStatus::Served);
        h.orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        let calls = h.remote.calls();
        assert!(calls.contains(&RemoteCall::CreateBill {
            order_id: "ord-1".into(),
            key: "bill_test1".into()
        }));
        assert!(calls.contains(&RemoteCall::ProcessPayment {
            bill_id: "bill-1".into(),
            key: "pay_test2".into(),
            method: PaymentMethod::Cash
        }));
    }

    #[tokio::test]
    async fn test_served_order_skips_status_update() {
        let h = harness(OrderStatus::Served);
        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert!(run.is_success());
        assert!(!h.remote.call_names().contains(&"update_order_status"));
    }

    #[tokio::test]
    async fn test_prepaid_bill_skips_payment() {
        let remote = Arc::new(
            FakeRemote::new()
                .with_order(order(OrderStatus::Served))
                .with_tables(tables())
                .with_prepaid_order("ord-1"),
        );
        let h = harness_with(remote, Arc::new(RecordingEmitter::new()));

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert!(run.is_success());
        assert!(!run.visited(SagaStep::ProcessingPayment));
        assert_eq!(h.remote.call_names(), vec!["create_bill", "update_table_status"]);
        let emitted = h.receipts.emitted();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].1.is_none());
    }

    // -------------------------------------------------------------------------
    // Permission and pre-flight
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_waiter_is_denied_without_remote_calls() {
        let h = harness(OrderStatus::Served);
        let run = h
            .orchestrator
            .close_table(&Actor::new("u-2", Role::Waiter), &cash_request(OrderStatus::Served))
            .await;

        assert!(h.remote.calls().is_empty());
        assert!(h.receipts.emitted().is_empty());
        assert_eq!(
            run.error(),
            Some(&SagaError::PermissionDenied {
                role: Role::Waiter,
                required: BILLING_ROLES.to_vec(),
            })
        );
        assert!(run.error().unwrap().to_string().contains("current role is Waiter"));
        assert_eq!(run.redirect_after, None);
        assert_eq!(
            run.trail,
            vec![SagaStep::Idle, SagaStep::CheckingPermission, SagaStep::Failed]
        );
    }

    #[tokio::test]
    async fn test_every_non_billing_role_is_denied() {
        for role in [Role::Chef, Role::Other("Intern".into())] {
            let h = harness(OrderStatus::Served);
            let run = h
                .orchestrator
                .close_table(&Actor::new("u", role), &cash_request(OrderStatus::Served))
                .await;
            assert!(matches!(run.error(), Some(SagaError::PermissionDenied { .. })));
            assert!(h.remote.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_configured_roles_cannot_admit_a_waiter() {
        let remote = remote(OrderStatus::Served);
        let settings = BillingSettings {
            required_roles: vec![Role::Waiter, Role::Cashier],
            ..BillingSettings::default()
        };
        let orchestrator = BillingOrchestrator::new(
            remote.clone(),
            Arc::new(MemoryOrderCache::new()),
            Arc::new(RecordingEmitter::new()),
            settings,
        );

        let run = orchestrator
            .close_table(&Actor::new("u-2", Role::Waiter), &cash_request(OrderStatus::Served))
            .await;
        assert_eq!(
            run.error(),
            Some(&SagaError::PermissionDenied {
                role: Role::Waiter,
                required: vec![Role::Cashier],
            })
        );
        assert!(remote.calls().is_empty());

        let run = orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;
        assert!(run.is_success());
    }

    #[tokio::test]
    async fn test_card_without_reference_fails_before_any_call() {
        let h = harness(OrderStatus::Served);
        let request = CloseTableRequest::new(order(OrderStatus::Served), PaymentMethod::Card);

        let run = h.orchestrator.close_table(&cashier(), &request).await;

        assert!(matches!(run.error(), Some(SagaError::InvalidRequest(_))));
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_settlement_of_same_order_is_rejected() {
        let h = harness(OrderStatus::Served);
        let _held = h.orchestrator.guard().try_acquire("ord-1").unwrap();

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert_eq!(
            run.error(),
            Some(&SagaError::AlreadyInProgress { order_id: "ord-1".into() })
        );
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_guard_released_after_run() {
        let h = harness(OrderStatus::Served);
        h.remote.fail(FailPoint::CreateBill, RemoteError::Timeout("POST /bills".into()));

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;
        assert!(!run.is_success());
        assert!(!h.orchestrator.guard().is_held("ord-1"));
    }

    // -------------------------------------------------------------------------
    // Fatal step failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_order_update_failure_is_fatal() {
        let h = harness(OrderStatus::Ready);
        h.remote.fail(
            FailPoint::UpdateOrderStatus,
            RemoteError::Server { status: 500, message: "boom".into() },
        );

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Ready))
            .await;

        assert!(matches!(run.error(), Some(SagaError::OrderUpdateFailed { .. })));
        assert_eq!(h.remote.call_names(), vec!["update_order_status"]);
    }

    #[tokio::test]
    async fn test_bill_failure_stops_before_payment_and_table() {
        let h = harness(OrderStatus::Served);
        h.remote.fail(FailPoint::CreateBill, RemoteError::Network("connection reset".into()));

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert!(matches!(run.error(), Some(SagaError::BillCreationFailed { .. })));
        let names = h.remote.call_names();
        assert!(!names.contains(&"process_payment"));
        assert!(!names.contains(&"update_table_status"));
        assert!(h.receipts.emitted().is_empty());
    }

    #[tokio::test]
    async fn test_payment_failure_leaves_table_occupied() {
        let h = harness(OrderStatus::Served);
        h.remote.fail(FailPoint::ProcessPayment, RemoteError::Gateway("card declined".into()));

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        match run.error() {
            Some(SagaError::PaymentFailed { bill_id, .. }) => assert_eq!(bill_id, "bill-1"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!h.remote.bills()[0].paid);
        assert_eq!(h.remote.table("t-4").unwrap().status, TableStatus::Occupied);
        assert!(!h.remote.call_names().contains(&"update_table_status"));
    }

    #[tokio::test]
    async fn test_retry_after_failure_uses_new_keys() {
        let h = harness(OrderStatus::Served);
        h.remote.fail(FailPoint::ProcessPayment, RemoteError::Timeout("POST /payments".into()));
        let first = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;
        assert!(!first.is_success());

        h.remote.clear_failure(FailPoint::ProcessPayment);
        let second = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;
        assert!(second.is_success());

        let bill_keys: Vec<String> = h
            .remote
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::CreateBill { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(bill_keys, vec!["bill_test1".to_string(), "bill_test3".to_string()]);
    }

    // -------------------------------------------------------------------------
    // Ordering
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_mutations_happen_in_order() {
        let h = harness(OrderStatus::Preparing);
        h.orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Preparing))
            .await;

        let names = h.remote.call_names();
        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(pos("update_order_status") < pos("create_bill"));
        assert!(pos("create_bill") < pos("process_payment"));
        assert!(pos("process_payment") < pos("update_table_status"));
    }

    // -------------------------------------------------------------------------
    // Non-fatal failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_table_failure_still_succeeds_and_emits_receipt() {
        let h = harness(OrderStatus::Served);
        h.remote.fail(FailPoint::UpdateTableStatus, RemoteError::Timeout("PATCH".into()));

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert!(run.is_success());
        assert!(!run.settlement().unwrap().table_freed);
        assert!(matches!(
            run.warnings.as_slice(),
            [RecoveredError::TableUpdateFailed { .. }]
        ));
        assert_eq!(run.user_warnings().count(), 0);
        assert_eq!(h.receipts.emitted().len(), 1);
        assert_eq!(h.observer.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_table_id_looked_up_when_unknown() {
        let h = harness(OrderStatus::Served);
        let request = CloseTableRequest::new(order(OrderStatus::Served), PaymentMethod::Cash);

        let run = h.orchestrator.close_table(&cashier(), &request).await;

        assert!(run.settlement().unwrap().table_freed);
        assert_eq!(
            h.remote.call_names(),
            vec!["create_bill", "process_payment", "list_tables", "update_table_status"]
        );
    }

    #[tokio::test]
    async fn test_unknown_table_number_is_a_warning() {
        let h = harness(OrderStatus::Served);
        h.remote.fail(FailPoint::ListTables, RemoteError::Unauthorized("expired".into()));
        let request = CloseTableRequest::new(order(OrderStatus::Served), PaymentMethod::Cash);

        let run = h.orchestrator.close_table(&cashier(), &request).await;

        assert!(run.is_success());
        assert!(matches!(
            &run.warnings[..],
            [RecoveredError::TableUpdateFailed { table, .. }] if table == "#4"
        ));
    }

    #[tokio::test]
    async fn test_cache_failure_is_a_warning() {
        let remote = remote(OrderStatus::Served);
        let receipts = Arc::new(RecordingEmitter::new());
        let orchestrator = BillingOrchestrator::new(
            remote.clone(),
            Arc::new(FailingOrderCache),
            receipts.clone(),
            BillingSettings::default(),
        );

        let run = orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert!(run.is_success());
        assert!(matches!(
            run.warnings.as_slice(),
            [RecoveredError::CacheInvalidationFailed { table_number: 4, .. }]
        ));
        assert_eq!(receipts.emitted().len(), 1);
    }

    #[tokio::test]
    async fn test_receipt_failure_is_reported_but_not_fatal() {
        let h = harness_with(
            remote(OrderStatus::Served),
            Arc::new(RecordingEmitter::failing("printer offline")),
        );

        let run = h
            .orchestrator
            .close_table(&cashier(), &cash_request(OrderStatus::Served))
            .await;

        assert!(run.is_success());
        assert_eq!(run.user_warnings().count(), 1);
        assert!(h.remote.bills()[0].paid);
        let settlement = run.into_result().unwrap();
        assert!(settlement.table_freed);
    }
}
