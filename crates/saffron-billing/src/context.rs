//! # Transaction Context
//!
//! The per-attempt facts a settlement needs, fixed before the first remote
//! call: which order, which table, how the guest pays, and the two
//! idempotency keys for this attempt.
//!
//! ```text
//!  CloseTableRequest ──► TransactionContext::begin() ──► (immutable)
//!    order                 order_id, order_status
//!    table_id?             table_id (resolved) / table_number
//!    known_tables          method, transaction_ref, gateway_result
//!    method, ref           bill_key  = bill_…
//!                          payment_key = pay_…
//! ```
//!
//! A user-initiated retry builds a new context and therefore new keys.

use saffron_core::validation::{validate_order_for_billing, validate_transaction_ref};
use saffron_core::{
    find_table_id, CoreError, IdempotencyKey, KeyPurpose, KeySource, Order, OrderStatus,
    PaymentMethod, Table,
};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// What the bill screen hands to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTableRequest {
    pub order: Order,
    /// Table id, when the screen already knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    /// Table list fetched earlier by the screen; used to resolve the id.
    #[serde(default)]
    pub known_tables: Vec<Table>,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_result: Option<serde_json::Value>,
}

impl CloseTableRequest {
    pub fn new(order: Order, method: PaymentMethod) -> Self {
        CloseTableRequest {
            order,
            table_id: None,
            known_tables: Vec::new(),
            method,
            transaction_ref: None,
            gateway_result: None,
        }
    }

    pub fn with_table_id(mut self, table_id: impl Into<String>) -> Self {
        self.table_id = Some(table_id.into());
        self
    }

    pub fn with_known_tables(mut self, tables: Vec<Table>) -> Self {
        self.known_tables = tables;
        self
    }

    pub fn with_transaction_ref(mut self, reference: impl Into<String>) -> Self {
        self.transaction_ref = Some(reference.into());
        self
    }

    pub fn with_gateway_result(mut self, result: serde_json::Value) -> Self {
        self.gateway_result = Some(result);
        self
    }
}

/// Immutable snapshot for one settlement attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionContext {
    order_id: String,
    order_status: OrderStatus,
    table_id: Option<String>,
    table_number: u32,
    method: PaymentMethod,
    transaction_ref: Option<String>,
    gateway_result: Option<serde_json::Value>,
    bill_key: IdempotencyKey,
    payment_key: IdempotencyKey,
}

impl TransactionContext {
    /// Validates the request and draws this attempt's keys.
    ///
    /// ## Errors
    /// - [`SagaError::MissingContext`]: blank order id, or neither a table id
    ///   nor a table number
    /// - [`SagaError::InvalidRequest`]: terminal order, bad line items,
    ///   non-cash payment without a transaction reference
    pub fn begin(request: &CloseTableRequest, keys: &dyn KeySource) -> Result<Self, SagaError> {
        let order = &request.order;

        if order.id.trim().is_empty() {
            return Err(SagaError::MissingContext("order id".into()));
        }

        let table_id = request
            .table_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or_else(|| find_table_id(&request.known_tables, order.table_number))
            .map(str::to_string);

        if table_id.is_none() && order.table_number == 0 {
            return Err(SagaError::MissingContext("table id or table number".into()));
        }

        validate_order_for_billing(order)?;

        let transaction_ref =
            validate_transaction_ref(request.method, request.transaction_ref.as_deref())
                .map_err(CoreError::from)?;

        Ok(TransactionContext {
            order_id: order.id.clone(),
            order_status: order.status,
            table_id,
            table_number: order.table_number,
            method: request.method,
            transaction_ref,
            gateway_result: request.gateway_result.clone(),
            bill_key: keys.new_key(KeyPurpose::Bill),
            payment_key: keys.new_key(KeyPurpose::Payment),
        })
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Status of the order when the attempt started.
    pub fn order_status(&self) -> OrderStatus {
        self.order_status
    }

    /// Resolved table id, if the request or the known table list had it.
    pub fn table_id(&self) -> Option<&str> {
        self.table_id.as_deref()
    }

    pub fn table_number(&self) -> u32 {
        self.table_number
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn transaction_ref(&self) -> Option<&str> {
        self.transaction_ref.as_deref()
    }

    pub fn gateway_result(&self) -> Option<&serde_json::Value> {
        self.gateway_result.as_ref()
    }

    pub fn bill_key(&self) -> &IdempotencyKey {
        &self.bill_key
    }

    pub fn payment_key(&self) -> &IdempotencyKey {
        &self.payment_key
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
