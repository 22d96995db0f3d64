//! # Validation Module
//!
//! Checks run before the settlement saga issues its first remote call.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Back-office form                                              │
//! │  └── Immediate feedback (empty fields, number formats)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── Typed errors before any mutation leaves the terminal               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Back-office API                                               │
//! │  └── Authoritative checks, idempotency de-duplication                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Order, OrderItem, PaymentMethod, Rate};
use crate::{MAX_ITEM_QUANTITY, MAX_TRANSACTION_REF_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Payment
// =============================================================================

/// Validates the transaction reference for a payment method.
///
/// ## Rules
/// - Cash: reference optional, ignored when blank
/// - Everything else: reference required, at most 64 characters
///
/// ## Returns
/// The trimmed reference, or `None` for cash without one.
///
/// ```rust
/// use saffron_core::validation::validate_transaction_ref;
/// use saffron_core::PaymentMethod;
///
/// assert_eq!(validate_transaction_ref(PaymentMethod::Cash, None).unwrap(), None);
/// assert!(validate_transaction_ref(PaymentMethod::Upi, Some("  ")).is_err());
/// assert_eq!(
///     validate_transaction_ref(PaymentMethod::Upi, Some(" 4123ABCD ")).unwrap().as_deref(),
///     Some("4123ABCD")
/// );
/// ```
pub fn validate_transaction_ref(
    method: PaymentMethod,
    reference: Option<&str>,
) -> ValidationResult<Option<String>> {
    let reference = reference.map(str::trim).filter(|r| !r.is_empty());

    match reference {
        None if method.requires_transaction_ref() => {
            Err(ValidationError::required("transaction reference"))
        }
        None => Ok(None),
        Some(r) if r.len() > MAX_TRANSACTION_REF_LEN => Err(ValidationError::TooLong {
            field: "transaction reference".to_string(),
            max: MAX_TRANSACTION_REF_LEN,
        }),
        Some(r) => Ok(Some(r.to_string())),
    }
}

// =============================================================================
// Amounts
// =============================================================================

/// Discounts are entered as positive amounts. Zero is fine.
pub fn validate_discount(discount: Money) -> ValidationResult<()> {
    if discount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }
    Ok(())
}

/// Rates are 0% to 100%.
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > 10000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10000,
        });
    }
    Ok(())
}

// =============================================================================
// Order
// =============================================================================

/// Validates a line quantity: 1 to 999.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates one order line.
pub fn validate_item(item: &OrderItem) -> ValidationResult<()> {
    if item.name.trim().is_empty() {
        return Err(ValidationError::required("item name"));
    }
    validate_quantity(item.quantity)?;
    if item.unit_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit price".to_string(),
        });
    }
    Ok(())
}

/// Checks that an order may be sent for billing.
///
/// ## Rules
/// - Order id present
/// - Not completed or cancelled
/// - Every line valid, discount non-negative
///
/// An empty item list is allowed: the bill is simply zero.
pub fn validate_order_for_billing(order: &Order) -> CoreResult<()> {
    if order.id.trim().is_empty() {
        return Err(ValidationError::required("order id").into());
    }

    if order.status.is_terminal() {
        return Err(CoreError::OrderNotBillable {
            order_id: order.id.clone(),
            status: order.status.to_string(),
        });
    }

    for item in &order.items {
        validate_item(item)?;
    }

    validate_discount(order.discount_or_zero())?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
