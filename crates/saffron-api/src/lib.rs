//! # saffron-api: HTTP Billing Remote
//!
//! [`HttpBillingRemote`] implements [`saffron_billing::BillingRemote`] over
//! the back-office REST API.
//!
//! ## Endpoints
//! ```text
//! ┌──────────────────────────┬───────────────────────────────────┬──────────────────┐
//! │ Port call                │ Request                           │ Idempotency-Key  │
//! ├──────────────────────────┼───────────────────────────────────┼──────────────────┤
//! │ update_order_status      │ PATCH {base}/orders/{id}/status   │                  │
//! │ create_bill              │ POST  {base}/bills                │ bill_…           │
//! │ process_payment          │ POST  {base}/payments             │ pay_…            │
//! │ update_table_status      │ PATCH {base}/tables/{id}/status   │                  │
//! │ list_tables              │ GET   {base}/tables               │                  │
//! └──────────────────────────┴───────────────────────────────────┴──────────────────┘
//! ```
//!
//! Transient failures (network, timeout, 5xx other than 502) are retried
//! with exponential backoff up to `remote.max_retries` times. A retry sends
//! the same body and the same key.

pub mod client;
pub mod error;

pub use client::{HttpBillingRemote, IDEMPOTENCY_HEADER};
pub use error::{ApiClientError, ApiClientResult};
