//! # Test Support
//!
//! In-memory stand-ins for the ports, shared by this crate's tests and by
//! downstream integration tests (enable the `testing` feature).
//!
//! ```text
//!  FakeRemote          records every call, de-duplicates bills and payments
//!                      by idempotency key, fails on demand
//!  RecordingEmitter    keeps every receipt it was asked to emit
//!  FailingOrderCache   every operation errors
//!  SequentialKeySource bill_test1, pay_test2, ...
//!  RecordingObserver   keeps the steps and warnings it saw
//! ```

use async_trait::async_trait;
use chrono::Utc;
use saffron_core::{
    compute_totals, Bill, BillInputs, IdempotencyKey, KeyPurpose, KeySource, Order, OrderStatus,
    Payment, PaymentMethod, Table, TableStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{CacheError, ReceiptError, RecoveredError, RemoteError, RemoteResult};
use crate::observer::SagaObserver;
use crate::ports::{BillingRemote, OrderCache, PaymentRequest, ReceiptEmitter};
use crate::state::SagaStep;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Fake Remote
// =============================================================================

/// One call received by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    UpdateOrderStatus { order_id: String, status: OrderStatus },
    CreateBill { order_id: String, key: String },
    ProcessPayment { bill_id: String, key: String, method: PaymentMethod },
    UpdateTableStatus { table_id: String, status: TableStatus },
    ListTables,
}

impl RemoteCall {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCall::UpdateOrderStatus { .. } => "update_order_status",
            RemoteCall::CreateBill { .. } => "create_bill",
            RemoteCall::ProcessPayment { .. } => "process_payment",
            RemoteCall::UpdateTableStatus { .. } => "update_table_status",
            RemoteCall::ListTables => "list_tables",
        }
    }
}

/// Operation of [`FakeRemote`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    UpdateOrderStatus,
    CreateBill,
    ProcessPayment,
    UpdateTableStatus,
    ListTables,
}

#[derive(Debug, Default)]
struct RemoteState {
    calls: Vec<RemoteCall>,
    orders: HashMap<String, Order>,
    tables: Vec<Table>,
    bills: Vec<Bill>,
    bill_keys: HashMap<String, String>,
    payments: Vec<Payment>,
    payment_keys: HashMap<String, String>,
    prepaid_orders: HashSet<String>,
    failures: HashMap<FailPoint, RemoteError>,
    inputs: BillInputs,
    next_id: u64,
}

impl RemoteState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check(&self, point: FailPoint) -> RemoteResult<()> {
        match self.failures.get(&point) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// A back office that lives in memory.
///
/// Behaves like the real server where the saga can tell the difference:
/// a repeated `create_bill` / `process_payment` with a known key returns
/// the original record instead of creating a second one.
#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<RemoteState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an order so bills can be raised for it.
    pub fn with_order(self, order: Order) -> Self {
        lock(&self.state).orders.insert(order.id.clone(), order);
        self
    }

    pub fn with_tables(self, tables: Vec<Table>) -> Self {
        lock(&self.state).tables = tables;
        self
    }

    /// Rates the fake server uses when computing bill totals.
    pub fn with_bill_inputs(self, inputs: BillInputs) -> Self {
        lock(&self.state).inputs = inputs;
        self
    }

    /// Bills raised for this order come back already paid.
    pub fn with_prepaid_order(self, order_id: &str) -> Self {
        lock(&self.state).prepaid_orders.insert(order_id.to_string());
        self
    }

    /// Every later call to `point` fails with `err` until cleared.
    pub fn fail(&self, point: FailPoint, err: RemoteError) {
        lock(&self.state).failures.insert(point, err);
    }

    pub fn clear_failure(&self, point: FailPoint) {
        lock(&self.state).failures.remove(&point);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.state).calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        lock(&self.state).calls.iter().map(RemoteCall::name).collect()
    }

    pub fn bills(&self) -> Vec<Bill> {
        lock(&self.state).bills.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        lock(&self.state).payments.clone()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        lock(&self.state).orders.get(order_id).cloned()
    }

    pub fn table(&self, table_id: &str) -> Option<Table> {
        lock(&self.state)
            .tables
            .iter()
            .find(|t| t.id == table_id)
            .cloned()
    }
}

#[async_trait]
impl BillingRemote for FakeRemote {
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> RemoteResult<Order> {
        let mut state = lock(&self.state);
        state.calls.push(RemoteCall::UpdateOrderStatus {
            order_id: order_id.to_string(),
            status,
        });
        state.check(FailPoint::UpdateOrderStatus)?;

        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| RemoteError::NotFound(format!("order {}", order_id)))?;
        order.status = status;
        Ok(order.clone())
    }

    async fn create_bill(&self, order_id: &str, key: &IdempotencyKey) -> RemoteResult<Bill> {
        let mut state = lock(&self.state);
        state.calls.push(RemoteCall::CreateBill {
            order_id: order_id.to_string(),
            key: key.to_string(),
        });
        state.check(FailPoint::CreateBill)?;

        if let Some(bill_id) = state.bill_keys.get(key.as_str()) {
            let existing = state.bills.iter().find(|b| &b.id == bill_id).cloned();
            if let Some(bill) = existing {
                return Ok(bill);
            }
        }

        let order = state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("order {}", order_id)))?;
        let inputs = BillInputs {
            discount: order.discount_or_zero(),
            ..state.inputs
        };
        let totals = compute_totals(&order.items, &inputs);

        let bill = Bill {
            id: state.next_id("bill"),
            order_id: order.id.clone(),
            items: order.items.clone(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            service_charge: totals.service_charge,
            discount: totals.discount,
            total: totals.total,
            paid: state.prepaid_orders.contains(order_id),
            created_at: Utc::now(),
        };
        state.bill_keys.insert(key.to_string(), bill.id.clone());
        state.bills.push(bill.clone());
        Ok(bill)
    }

    async fn process_payment(&self, request: &PaymentRequest) -> RemoteResult<Payment> {
        let mut state = lock(&self.state);
        state.calls.push(RemoteCall::ProcessPayment {
            bill_id: request.bill_id.clone(),
            key: request.idempotency_key.to_string(),
            method: request.method,
        });
        state.check(FailPoint::ProcessPayment)?;

        if let Some(payment_id) = state.payment_keys.get(request.idempotency_key.as_str()) {
            let existing = state.payments.iter().find(|p| &p.id == payment_id).cloned();
            if let Some(payment) = existing {
                return Ok(payment);
            }
        }

        let amount = {
            let bill = state
                .bills
                .iter_mut()
                .find(|b| b.id == request.bill_id)
                .ok_or_else(|| RemoteError::NotFound(format!("bill {}", request.bill_id)))?;
            if bill.paid {
                return Err(RemoteError::Validation(format!(
                    "bill {} is already paid",
                    bill.id
                )));
            }
            bill.paid = true;
            bill.total
        };

        let payment = Payment {
            id: state.next_id("pay"),
            bill_id: request.bill_id.clone(),
            method: request.method,
            transaction_ref: request.transaction_ref.clone(),
            idempotency_key: request.idempotency_key.to_string(),
            gateway_result: request.gateway_result.clone(),
            amount,
            created_at: Utc::now(),
        };
        state
            .payment_keys
            .insert(request.idempotency_key.to_string(), payment.id.clone());
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn update_table_status(&self, table_id: &str, status: TableStatus) -> RemoteResult<Table> {
        let mut state = lock(&self.state);
        state.calls.push(RemoteCall::UpdateTableStatus {
            table_id: table_id.to_string(),
            status,
        });
        state.check(FailPoint::UpdateTableStatus)?;

        let table = state
            .tables
            .iter_mut()
            .find(|t| t.id == table_id)
            .ok_or_else(|| RemoteError::NotFound(format!("table {}", table_id)))?;
        table.status = status;
        Ok(table.clone())
    }

    async fn list_tables(&self) -> RemoteResult<Vec<Table>> {
        let mut state = lock(&self.state);
        state.calls.push(RemoteCall::ListTables);
        state.check(FailPoint::ListTables)?;
        Ok(state.tables.clone())
    }
}

// =============================================================================
// Receipt, Cache, Keys, Observer
// =============================================================================

/// Keeps every emitted receipt. Optionally fails every emission.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    emitted: Mutex<Vec<(Bill, Option<Payment>)>>,
    failure: Option<String>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An emitter that records the attempt and then fails.
    pub fn failing(reason: impl Into<String>) -> Self {
        RecordingEmitter {
            emitted: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn emitted(&self) -> Vec<(Bill, Option<Payment>)> {
        lock(&self.emitted).clone()
    }
}

#[async_trait]
impl ReceiptEmitter for RecordingEmitter {
    async fn emit(&self, bill: &Bill, payment: Option<&Payment>) -> Result<(), ReceiptError> {
        lock(&self.emitted).push((bill.clone(), payment.cloned()));
        match &self.failure {
            Some(reason) => Err(ReceiptError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// An order cache whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingOrderCache;

#[async_trait]
impl OrderCache for FailingOrderCache {
    async fn get_in_progress(&self, _table_number: u32) -> Result<Option<Order>, CacheError> {
        Err(CacheError::Backend("cache unavailable".into()))
    }

    async fn put_in_progress(&self, _order: &Order) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache unavailable".into()))
    }

    async fn remove_in_progress(&self, _table_number: u32) -> Result<bool, CacheError> {
        Err(CacheError::Backend("cache unavailable".into()))
    }
}

/// Predictable keys: `bill_test1`, `pay_test2`, ...
#[derive(Debug, Default)]
pub struct SequentialKeySource {
    next: AtomicU64,
}

impl KeySource for SequentialKeySource {
    fn new_key(&self, purpose: KeyPurpose) -> IdempotencyKey {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        IdempotencyKey::from_string(format!("{}_test{}", purpose.prefix(), n))
    }
}

/// Keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    steps: Mutex<Vec<(String, SagaStep)>>,
    warnings: Mutex<Vec<RecoveredError>>,
}

impl RecordingObserver {
    pub fn steps(&self) -> Vec<SagaStep> {
        lock(&self.steps).iter().map(|(_, step)| *step).collect()
    }

    pub fn warnings(&self) -> Vec<RecoveredError> {
        lock(&self.warnings).clone()
    }
}

impl SagaObserver for RecordingObserver {
    fn on_step(&self, order_id: &str, step: SagaStep) {
        lock(&self.steps).push((order_id.to_string(), step));
    }

    fn on_warning(&self, _order_id: &str, warning: &RecoveredError) {
        lock(&self.warnings).push(warning.clone());
    }
}
