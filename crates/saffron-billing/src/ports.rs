//! # Ports
//!
//! Everything the settlement saga touches outside the process goes through
//! one of these traits. `saffron-api` implements [`BillingRemote`] over HTTP,
//! `saffron-db` implements [`OrderCache`] over SQLite, and the CLI provides a
//! JSON [`ReceiptEmitter`](crate::receipt::JsonReceiptEmitter).
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │ BillingOrchestrator  │
//!                    └──────────┬───────────┘
//!          ┌────────────────────┼──────────────────────┐
//!          ▼                    ▼                      ▼
//!  ┌───────────────┐   ┌────────────────┐   ┌────────────────────┐
//!  │ BillingRemote │   │  OrderCache    │   │  ReceiptEmitter    │
//!  │ orders, bills │   │  in-progress   │   │  bill + payment    │
//!  │ payments,     │   │  order per     │   │  → printer / JSON  │
//!  │ tables        │   │  table number  │   │                    │
//!  └───────────────┘   └────────────────┘   └────────────────────┘
//! ```

use async_trait::async_trait;
use saffron_core::{
    Bill, IdempotencyKey, Order, OrderStatus, Payment, PaymentMethod, Table, TableStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, ReceiptError, RemoteResult};

// =============================================================================
// Remote API
// =============================================================================

/// Body of a payment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub bill_id: String,
    pub idempotency_key: IdempotencyKey,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_result: Option<serde_json::Value>,
}

/// The back-office API.
///
/// `create_bill` and `process_payment` must be safe to deliver twice with
/// the same key: the server returns the record created by the first
/// delivery.
#[async_trait]
pub trait BillingRemote: Send + Sync {
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> RemoteResult<Order>;

    async fn create_bill(&self, order_id: &str, key: &IdempotencyKey) -> RemoteResult<Bill>;

    async fn process_payment(&self, request: &PaymentRequest) -> RemoteResult<Payment>;

    async fn update_table_status(&self, table_id: &str, status: TableStatus) -> RemoteResult<Table>;

    async fn list_tables(&self) -> RemoteResult<Vec<Table>>;
}

// =============================================================================
// Local Order Cache
// =============================================================================

/// In-progress orders keyed by table number.
///
/// Written by the order screens, read by the bill screen, cleared by the
/// saga once the table is settled.
#[async_trait]
pub trait OrderCache: Send + Sync {
    async fn get_in_progress(&self, table_number: u32) -> Result<Option<Order>, CacheError>;

    async fn put_in_progress(&self, order: &Order) -> Result<(), CacheError>;

    /// Returns whether an entry was present.
    async fn remove_in_progress(&self, table_number: u32) -> Result<bool, CacheError>;
}

// =============================================================================
// Receipt
// =============================================================================

/// Renders a finalized bill. `payment` is `None` when the bill was already
/// paid before this settlement.
#[async_trait]
pub trait ReceiptEmitter: Send + Sync {
    async fn emit(&self, bill: &Bill, payment: Option<&Payment>) -> Result<(), ReceiptError>;
}
