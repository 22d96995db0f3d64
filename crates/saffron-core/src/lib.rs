//! # saffron-core: Pure Settlement Logic for Saffron POS
//!
//! Everything needed to reason about closing a table without touching the
//! network: money, domain records, bill math, role checks and idempotency
//! keys.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Saffron POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Back-office UI / settle-cli                     │   │
//! │  │       Order view ──► Bill preview ──► "Close & Print"           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              saffron-billing (settlement saga)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ saffron-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │ billing │ │permission│ │ idem-  │  │   │
//! │  │   │  Order  │ │  Money  │ │ totals  │ │  Role    │ │ potency│  │   │
//! │  │   │  Bill   │ │  Rate   │ │tax split│ │  gate    │ │  keys  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Order, Bill, Payment, Table)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`billing`] - Bill calculator used for the live preview
//! - [`permission`] - Role allow-list checks
//! - [`idempotency`] - Keys that make retried mutations safe
//! - [`validation`] - Input checks run before any mutation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use saffron_core::billing::{compute_totals, BillInputs};
//! use saffron_core::{Money, OrderItem, Rate};
//!
//! let items = vec![
//!     OrderItem::new("Paneer Tikka", 2, Money::from_major_minor(100, 0)),
//!     OrderItem::new("Lassi", 1, Money::from_major_minor(50, 0)),
//! ];
//! let totals = compute_totals(
//!     &items,
//!     &BillInputs::new()
//!         .discount(Money::from_major_minor(20, 0))
//!         .tax(Rate::from_bps(500)),
//! );
//! assert_eq!(totals.total, Money::from_cents(24250)); // ₹242.50
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod idempotency;
pub mod money;
pub mod permission;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use billing::{compute_totals, preview_order, BillInputs, BillTotals, TaxSplit};
pub use error::{CoreError, CoreResult, ValidationError};
pub use idempotency::{IdempotencyKey, KeyPurpose, KeySource, RandomKeySource};
pub use money::Money;
pub use permission::{authorize, describe_roles, Actor, Authorization, Role, BILLING_ROLES};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line item.
///
/// Guards against typos at the order screen (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of a payment transaction reference (UTR, card auth code).
pub const MAX_TRANSACTION_REF_LEN: usize = 64;
