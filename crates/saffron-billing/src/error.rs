//! # Billing Error Types
//!
//! Error types for the settlement saga and the ports it calls through.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Settlement Error Categories                         │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Fatal          │  │  Recovered      │  │  Port failures          │ │
//! │  │  (SagaError)    │  │ (RecoveredError)│  │                         │ │
//! │  │                 │  │                 │  │  RemoteError            │ │
//! │  │  PermissionDenied│ │  TableUpdate    │  │  CacheError             │ │
//! │  │  MissingContext │  │  CacheInvalidate│  │  ReceiptError           │ │
//! │  │  OrderUpdate    │  │  ReceiptEmission│  │                         │ │
//! │  │  BillCreation   │  │                 │  │  ConfigError            │ │
//! │  │  Payment        │  │  logged, saga   │  │                         │ │
//! │  │  → saga halts   │  │  still succeeds │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use saffron_core::permission::describe_roles;
use saffron_core::{CoreError, Role};
use thiserror::Error;

// =============================================================================
// Remote Errors
// =============================================================================

/// Failure of one call to the back-office API.
///
/// Timeouts are produced by the transport; the saga treats them like any
/// other failure of the step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Rejected by server: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether retrying the same request (same idempotency key) could help.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout(_) => true,
            RemoteError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for port calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

// =============================================================================
// Cache / Receipt Errors
// =============================================================================

/// Failure of the local order-in-progress cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cached order for table {table_number} is corrupt: {reason}")]
    Corrupt { table_number: u32, reason: String },
}

/// Failure to produce the receipt artifact.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("Receipt output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Receipt serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Receipt rejected by printer: {0}")]
    Rejected(String),
}

// =============================================================================
// Saga Errors (fatal)
// =============================================================================

/// A failure that stops the settlement saga.
///
/// Every message is written for the error panel shown to staff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
    #[error(
        "Permission denied: closing a table requires one of {}; current role is {role}",
        describe_roles(.required)
    )]
    PermissionDenied { role: Role, required: Vec<Role> },

    #[error("Missing context: {0}")]
    MissingContext(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    #[error("A settlement for order {order_id} is already in progress")]
    AlreadyInProgress { order_id: String },

    #[error("Could not mark order {order_id} as served: {source}")]
    OrderUpdateFailed {
        order_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("Could not create the bill for order {order_id}: {source}")]
    BillCreationFailed {
        order_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("Payment for bill {bill_id} failed: {source}. The table is still occupied.")]
    PaymentFailed {
        bill_id: String,
        #[source]
        source: RemoteError,
    },

    /// A step reported an outcome that does not belong to the current state.
    #[error("Internal error: {event} is not valid while {state}")]
    OutOfOrder {
        state: &'static str,
        event: &'static str,
    },
}

impl SagaError {
    /// Machine-readable code for the frontend.
    pub fn code(&self) -> &'static str {
        match self {
            SagaError::PermissionDenied { .. } => "PERMISSION_DENIED",
            SagaError::MissingContext(_) => "MISSING_CONTEXT",
            SagaError::InvalidRequest(_) => "VALIDATION_ERROR",
            SagaError::AlreadyInProgress { .. } => "ALREADY_IN_PROGRESS",
            SagaError::OrderUpdateFailed { .. } => "ORDER_UPDATE_FAILED",
            SagaError::BillCreationFailed { .. } => "BILL_CREATION_FAILED",
            SagaError::PaymentFailed { .. } => "PAYMENT_FAILED",
            SagaError::OutOfOrder { .. } => "INTERNAL",
        }
    }

    /// True when no remote mutation can have happened before the failure.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            SagaError::PermissionDenied { .. }
                | SagaError::MissingContext(_)
                | SagaError::InvalidRequest(_)
                | SagaError::AlreadyInProgress { .. }
        )
    }
}

// =============================================================================
// Recovered Errors (non-fatal)
// =============================================================================

/// A failure that is logged and does not stop the saga.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveredError {
    #[error("Table {table} could not be marked available: {reason}")]
    TableUpdateFailed { table: String, reason: String },

    #[error("Cached order for table {table_number} could not be cleared: {reason}")]
    CacheInvalidationFailed { table_number: u32, reason: String },

    #[error("Bill {bill_id} was paid but the receipt could not be produced: {reason}")]
    ReceiptEmissionFailed { bill_id: String, reason: String },

    /// The saga was interrupted after payment and settled without the
    /// remaining steps.
    #[error("Bill {bill_id} was paid but {step} did not finish: {reason}")]
    StepAbandoned {
        bill_id: String,
        step: &'static str,
        reason: String,
    },
}

impl RecoveredError {
    /// Staff hear about a missing receipt or an abandoned step; the rest is
    /// for the logs.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            RecoveredError::ReceiptEmissionFailed { .. } | RecoveredError::StepAbandoned { .. }
        )
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid billing configuration: {0}")]
    Invalid(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

/// Result type alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================
