//! # Domain Types
//!
//! Records exchanged with the back-office API during settlement.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │      Bill       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  order_id       │◄──│  bill_id        │       │
//! │  │  table_number   │   │  items snapshot │   │  method         │       │
//! │  │  items          │   │  totals         │   │  transaction_ref│       │
//! │  │  status         │   │  paid           │   │  idempotency_key│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Table       │   │   OrderStatus   │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  Pending..Ready │   │  Cash  Card     │       │
//! │  │  table_number   │   │  Served         │   │  Upi   Wallet   │       │
//! │  │  status         │   │  Completed      │   │  Other          │       │
//! │  └─────────────────┘   │  Cancelled      │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// 1 bp = 0.01%, so 500 bps = 5% GST and 1000 bps = 10% service charge.
/// Used for both tax and service charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (configuration and UI input).
    ///
    /// ## Errors
    /// - [`ValidationError::OutOfRange`]: NaN, infinite or too large
    /// - [`ValidationError::MustNotBeNegative`]: below zero
    /// - [`ValidationError::TooPrecise`]: finer than one basis point (0.01%)
    pub fn from_percentage(pct: f64) -> Result<Self, ValidationError> {
        let max_pct = i64::from(u32::MAX / 100);
        if !pct.is_finite() || pct > max_pct as f64 {
            return Err(ValidationError::OutOfRange {
                field: "rate".into(),
                min: 0,
                max: max_pct,
            });
        }
        if pct < 0.0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "rate".into(),
            });
        }

        let scaled = pct * 100.0;
        let bps = scaled.round();
        if (scaled - bps).abs() > 1e-6 {
            return Err(ValidationError::TooPrecise {
                field: "rate".into(),
                places: 2,
            });
        }
        Ok(Rate(bps as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Order
// =============================================================================

/// Lifecycle of a kitchen order.
///
/// ```text
/// Pending → Confirmed → Preparing → Ready → Served → Completed
///     └──────────────────────┴──────────────────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    /// Food is on the table; the only status a bill may be raised from.
    Served,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Billed or cancelled orders never move again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Menu item name at the time of ordering.
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Kitchen note ("no onion").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OrderItem {
    pub fn new(name: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        OrderItem {
            name: name.into(),
            quantity,
            unit_price,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// `unit_price × quantity`, exact.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// An in-progress order for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub table_number: u32,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub status: OrderStatus,
    /// Flat discount entered by staff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
    /// Subtotal as last computed by the server, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<Money>,
}

impl Order {
    /// The flat discount, or zero.
    pub fn discount_or_zero(&self) -> Money {
        self.discount.unwrap_or_default()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

// =============================================================================
// Bill
// =============================================================================

/// A bill raised for exactly one order.
///
/// The server computes the authoritative totals. After creation only the
/// `paid` flag changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub order_id: String,
    /// Frozen copy of the order lines.
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub tax: Money,
    #[serde(default)]
    pub service_charge: Money,
    #[serde(default)]
    pub discount: Money,
    pub total: Money,
    #[serde(default)]
    pub paid: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// How the guest paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    Wallet,
    Other,
}

impl PaymentMethod {
    /// Everything except cash leaves a trail (UTR, auth code, wallet txn id)
    /// that must be recorded with the payment.
    pub const fn requires_transaction_ref(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "wallet" => Ok(PaymentMethod::Wallet),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: ["cash", "card", "upi", "wallet", "other"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

/// A payment recorded against a bill. One per bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub bill_id: String,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    pub idempotency_key: String,
    /// Opaque response from the payment gateway, stored as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub gateway_result: Option<serde_json::Value>,
    #[serde(default)]
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    #[default]
    Available,
    Occupied,
    Reserved,
    Cleaning,
}

impl TableStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
            TableStatus::Reserved => "reserved",
            TableStatus::Cleaning => "cleaning",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dining table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub table_number: u32,
    #[serde(default)]
    pub status: TableStatus,
}

/// Finds the table id for a table number in a previously fetched list.
pub fn find_table_id(tables: &[Table], table_number: u32) -> Option<&str> {
    tables
        .iter()
        .find(|t| t.table_number == table_number)
        .map(|t| t.id.as_str())
}

// =============================================================================
// Unit Tests
// =============================================================================
