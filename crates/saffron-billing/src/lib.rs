//! # saffron-billing: Table Settlement for Saffron POS
//!
//! Turns an open order into a paid bill and a free table, talking to the
//! back office only through ports.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Settlement Architecture                            │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 BillingOrchestrator::close_table                 │  │
//! │  │                                                                  │  │
//! │  │  permission ─► context + keys ─► in-flight guard ─► steps        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ StepEvent                               │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │              SagaState::advance (pure, no I/O)                   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ BillingRemote  │  │  OrderCache    │  │  ReceiptEmitter        │    │
//! │  │ (saffron-api)  │  │ (memory/sqlite)│  │  (JSON, printer, ...)  │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  SagaObserver receives every step; the caller gets a SagaRun.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`orchestrator`] - `BillingOrchestrator` and the `SagaRun` report
//! - [`state`] - States, events and the transition function
//! - [`context`] - `CloseTableRequest` and the per-attempt `TransactionContext`
//! - [`ports`] - Traits for the remote API, the order cache and receipts
//! - [`guard`] - One settlement per order at a time
//! - [`observer`] - Progress notifications
//! - [`cache`] - In-memory order cache
//! - [`receipt`] - Receipt artifact and JSON emitter
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Fatal, recovered and port errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use saffron_billing::{BillingConfig, BillingOrchestrator, CloseTableRequest, MemoryOrderCache};
//!
//! let config = BillingConfig::load(None)?;
//! let orchestrator = BillingOrchestrator::new(remote, cache, receipts, config.billing.clone());
//!
//! let run = orchestrator.close_table(&actor, &request).await;
//! match run.into_result() {
//!     Ok(settlement) => println!("Paid {}", settlement.bill.total),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod observer;
pub mod orchestrator;
pub mod ports;
pub mod receipt;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::MemoryOrderCache;
pub use config::{BillingConfig, BillingSettings, CacheBackend, CacheSettings, RemoteSettings};
pub use context::{CloseTableRequest, TransactionContext};
pub use error::{
    CacheError, ConfigError, ConfigResult, ReceiptError, RecoveredError, RemoteError,
    RemoteResult, SagaError,
};
pub use guard::{InFlightGuard, InFlightTicket};
pub use observer::{NoOpObserver, SagaObserver, TracingObserver};
pub use orchestrator::{BillingOrchestrator, SagaRun};
pub use ports::{BillingRemote, OrderCache, PaymentRequest, ReceiptEmitter};
pub use receipt::{JsonReceiptEmitter, Receipt, ReceiptTarget};
pub use state::{SagaState, SagaStep, Settlement, StepEvent, Transition};
