//! # Settlement State Machine
//!
//! Pure transition function for the table-closing saga. The orchestrator
//! performs the side effect belonging to the current state, wraps the
//! outcome in a [`StepEvent`] and feeds it to [`SagaState::advance`].
//!
//! ## State Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Idle ──► CheckingPermission ──► EnsuringOrderServed ──► CreatingBill   │
//! │                 │ denied               │ update fails       │ fails     │
//! │                 ▼                      ▼                    ▼           │
//! │              Failed ◄──────────────────┴────────────────────┤           │
//! │                 ▲                                           │ bill      │
//! │                 │ payment fails                             ▼           │
//! │                 └───────────────────────────── ProcessingPayment        │
//! │                                                  │ (skipped if paid)    │
//! │                                                  ▼                      │
//! │   Succeeded ◄── EmittingReceipt ◄── InvalidatingCache ◄── UpdatingTable │
//! │                                                                         │
//! │   Failures after payment are recorded as warnings and never stop the    │
//! │   saga: the money is already taken.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use saffron_core::{Authorization, Bill, Order, Payment, Role, Table};
use serde::Serialize;
use std::fmt;

use crate::error::{CacheError, RecoveredError, RemoteResult, SagaError};

// =============================================================================
// States
// =============================================================================

/// Where a settlement is, with whatever it has produced so far.
#[derive(Debug, Clone, PartialEq)]
pub enum SagaState {
    Idle,
    CheckingPermission,
    EnsuringOrderServed,
    CreatingBill,
    ProcessingPayment {
        bill: Bill,
    },
    UpdatingTable {
        bill: Bill,
        payment: Option<Payment>,
    },
    InvalidatingCache {
        bill: Bill,
        payment: Option<Payment>,
        table_freed: bool,
    },
    EmittingReceipt {
        bill: Bill,
        payment: Option<Payment>,
        table_freed: bool,
    },
    Succeeded(Settlement),
    Failed(SagaError),
}

/// The result of a completed settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Server copy of the bill; `paid` is true.
    pub bill: Bill,
    /// `None` when the bill was already paid before this settlement.
    pub payment: Option<Payment>,
    /// False when the table update failed and staff must free it by hand.
    pub table_freed: bool,
}

/// Name of a state, without its data. Used for trails and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    Idle,
    CheckingPermission,
    EnsuringOrderServed,
    CreatingBill,
    ProcessingPayment,
    UpdatingTable,
    InvalidatingCache,
    EmittingReceipt,
    Succeeded,
    Failed,
}

impl SagaStep {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SagaStep::Idle => "idle",
            SagaStep::CheckingPermission => "checking_permission",
            SagaStep::EnsuringOrderServed => "ensuring_order_served",
            SagaStep::CreatingBill => "creating_bill",
            SagaStep::ProcessingPayment => "processing_payment",
            SagaStep::UpdatingTable => "updating_table",
            SagaStep::InvalidatingCache => "invalidating_cache",
            SagaStep::EmittingReceipt => "emitting_receipt",
            SagaStep::Succeeded => "succeeded",
            SagaStep::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, SagaStep::Succeeded | SagaStep::Failed)
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SagaState {
    pub fn step(&self) -> SagaStep {
        match self {
            SagaState::Idle => SagaStep::Idle,
            SagaState::CheckingPermission => SagaStep::CheckingPermission,
            SagaState::EnsuringOrderServed => SagaStep::EnsuringOrderServed,
            SagaState::CreatingBill => SagaStep::CreatingBill,
            SagaState::ProcessingPayment { .. } => SagaStep::ProcessingPayment,
            SagaState::UpdatingTable { .. } => SagaStep::UpdatingTable,
            SagaState::InvalidatingCache { .. } => SagaStep::InvalidatingCache,
            SagaState::EmittingReceipt { .. } => SagaStep::EmittingReceipt,
            SagaState::Succeeded(_) => SagaStep::Succeeded,
            SagaState::Failed(_) => SagaStep::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.step().is_terminal()
    }

    /// The bill, once one exists.
    pub fn bill(&self) -> Option<&Bill> {
        match self {
            SagaState::ProcessingPayment { bill }
            | SagaState::UpdatingTable { bill, .. }
            | SagaState::InvalidatingCache { bill, .. }
            | SagaState::EmittingReceipt { bill, .. } => Some(bill),
            SagaState::Succeeded(settlement) => Some(&settlement.bill),
            _ => None,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Outcome of the side effect performed for the current state.
#[derive(Debug)]
pub enum StepEvent {
    Started,
    PermissionChecked {
        authorization: Authorization,
        required: Vec<Role>,
    },
    /// The order was already `served`; no status update needed.
    OrderAlreadyServed,
    OrderStatusUpdated {
        order_id: String,
        result: RemoteResult<Order>,
    },
    BillCreated {
        order_id: String,
        result: RemoteResult<Bill>,
    },
    PaymentProcessed(RemoteResult<Payment>),
    TableFreed(Table),
    /// The table id could not be resolved or the update failed.
    TableNotFreed { table: String, reason: String },
    CacheInvalidated {
        table_number: u32,
        result: Result<bool, CacheError>,
    },
    ReceiptEmitted(Result<(), String>),
    /// Pre-flight failure raised by the orchestrator itself.
    Aborted(SagaError),
}

impl StepEvent {
    fn name(&self) -> &'static str {
        match self {
            StepEvent::Started => "started",
            StepEvent::PermissionChecked { .. } => "permission_checked",
            StepEvent::OrderAlreadyServed => "order_already_served",
            StepEvent::OrderStatusUpdated { .. } => "order_status_updated",
            StepEvent::BillCreated { .. } => "bill_created",
            StepEvent::PaymentProcessed(_) => "payment_processed",
            StepEvent::TableFreed(_) => "table_freed",
            StepEvent::TableNotFreed { .. } => "table_not_freed",
            StepEvent::CacheInvalidated { .. } => "cache_invalidated",
            StepEvent::ReceiptEmitted(_) => "receipt_emitted",
            StepEvent::Aborted(_) => "aborted",
        }
    }
}

/// Result of [`SagaState::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: SagaState,
    /// Set when a post-payment step failed and the saga moved on anyway.
    pub warning: Option<RecoveredError>,
}

impl Transition {
    fn to(next: SagaState) -> Self {
        Transition { next, warning: None }
    }

    fn with_warning(next: SagaState, warning: RecoveredError) -> Self {
        Transition {
            next,
            warning: Some(warning),
        }
    }

    fn fail(err: SagaError) -> Self {
        Transition::to(SagaState::Failed(err))
    }
}

// =============================================================================
// Transition Function
// =============================================================================

impl SagaState {
    /// Computes the next state. No I/O.
    ///
    /// Terminal states ignore further events. Before payment, an abort fails
    /// the saga and an event that does not belong to the current state fails
    /// it with [`SagaError::OutOfOrder`]. After payment both settle the saga
    /// with a [`RecoveredError::StepAbandoned`] warning.
    pub fn advance(self, event: StepEvent) -> Transition {
        if self.is_terminal() {
            return Transition::to(self);
        }

        match (self, event) {
            (SagaState::Idle, StepEvent::Started) => Transition::to(SagaState::CheckingPermission),

            (
                SagaState::CheckingPermission,
                StepEvent::PermissionChecked {
                    authorization,
                    required,
                },
            ) => match authorization {
                Authorization::Allowed => Transition::to(SagaState::EnsuringOrderServed),
                Authorization::Denied { role } => {
                    Transition::fail(SagaError::PermissionDenied { role, required })
                }
            },

            (SagaState::EnsuringOrderServed, StepEvent::OrderAlreadyServed) => {
                Transition::to(SagaState::CreatingBill)
            }
            (SagaState::EnsuringOrderServed, StepEvent::OrderStatusUpdated { order_id, result }) => {
                match result {
                    Ok(_) => Transition::to(SagaState::CreatingBill),
                    Err(source) => {
                        Transition::fail(SagaError::OrderUpdateFailed { order_id, source })
                    }
                }
            }

            (SagaState::CreatingBill, StepEvent::BillCreated { order_id, result }) => match result {
                Ok(bill) if bill.paid => Transition::to(SagaState::UpdatingTable {
                    bill,
                    payment: None,
                }),
                Ok(bill) => Transition::to(SagaState::ProcessingPayment { bill }),
                Err(source) => Transition::fail(SagaError::BillCreationFailed { order_id, source }),
            },

            (SagaState::ProcessingPayment { mut bill }, StepEvent::PaymentProcessed(result)) => {
                match result {
                    Ok(payment) => {
                        bill.paid = true;
                        Transition::to(SagaState::UpdatingTable {
                            bill,
                            payment: Some(payment),
                        })
                    }
                    Err(source) => Transition::fail(SagaError::PaymentFailed {
                        bill_id: bill.id,
                        source,
                    }),
                }
            }

            (SagaState::UpdatingTable { bill, payment }, StepEvent::TableFreed(_)) => {
                Transition::to(SagaState::InvalidatingCache {
                    bill,
                    payment,
                    table_freed: true,
                })
            }
            (SagaState::UpdatingTable { bill, payment }, StepEvent::TableNotFreed { table, reason }) => {
                Transition::with_warning(
                    SagaState::InvalidatingCache {
                        bill,
                        payment,
                        table_freed: false,
                    },
                    RecoveredError::TableUpdateFailed { table, reason },
                )
            }

            (
                SagaState::InvalidatingCache {
                    bill,
                    payment,
                    table_freed,
                },
                StepEvent::CacheInvalidated {
                    table_number,
                    result,
                },
            ) => {
                let next = SagaState::EmittingReceipt {
                    bill,
                    payment,
                    table_freed,
                };
                match result {
                    Ok(_) => Transition::to(next),
                    Err(e) => Transition::with_warning(
                        next,
                        RecoveredError::CacheInvalidationFailed {
                            table_number,
                            reason: e.to_string(),
                        },
                    ),
                }
            }

            (
                SagaState::EmittingReceipt {
                    bill,
                    payment,
                    table_freed,
                },
                StepEvent::ReceiptEmitted(result),
            ) => {
                let bill_id = bill.id.clone();
                let next = SagaState::Succeeded(Settlement {
                    bill,
                    payment,
                    table_freed,
                });
                match result {
                    Ok(()) => Transition::to(next),
                    Err(reason) => Transition::with_warning(
                        next,
                        RecoveredError::ReceiptEmissionFailed { bill_id, reason },
                    ),
                }
            }

            (state, event) => {
                let step = state.step();
                let reason = match &event {
                    StepEvent::Aborted(err) => err.to_string(),
                    other => format!("{} is not valid while {}", other.name(), step),
                };
                match state.into_settlement() {
                    Ok(settlement) => {
                        let warning = RecoveredError::StepAbandoned {
                            bill_id: settlement.bill.id.clone(),
                            step: step.as_str(),
                            reason,
                        };
                        Transition::with_warning(SagaState::Succeeded(settlement), warning)
                    }
                    Err(_) => match event {
                        StepEvent::Aborted(err) => Transition::fail(err),
                        other => Transition::fail(SagaError::OutOfOrder {
                            state: step.as_str(),
                            event: other.name(),
                        }),
                    },
                }
            }
        }
    }

    /// The settlement held by a state reached after payment. Other states
    /// are handed back unchanged.
    fn into_settlement(self) -> Result<Settlement, SagaState> {
        match self {
            SagaState::UpdatingTable { bill, payment } => Ok(Settlement {
                bill,
                payment,
                table_freed: false,
            }),
            SagaState::InvalidatingCache {
                bill,
                payment,
                table_freed,
            }
            | SagaState::EmittingReceipt {
                bill,
                payment,
                table_freed,
            } => Ok(Settlement {
                bill,
                payment,
                table_freed,
            }),
            other => Err(other),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
