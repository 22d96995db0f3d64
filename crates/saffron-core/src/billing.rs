//! # Bill Calculator
//!
//! Live preview of a bill before it is submitted. The server recomputes the
//! final totals when the bill is created; this module only has to agree
//! with it on well-formed input.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal        = Σ unit_price × quantity                (exact)       │
//! │  tax             = include_tax ? subtotal × tax_rate : 0                │
//! │  service_charge  = include_service ? subtotal × service_rate : 0        │
//! │  total           = subtotal − discount + tax + service_charge + tip     │
//! │                                                                         │
//! │  Percentages round half away from zero to the nearest paisa.            │
//! │  total is NOT clamped: a discount above subtotal goes negative.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use saffron_core::billing::{compute_totals, BillInputs};
//! use saffron_core::{Money, OrderItem, Rate};
//!
//! let items = [OrderItem::new("Thali", 1, Money::from_cents(30000))];
//! let totals = compute_totals(&items, &BillInputs::new().tax(Rate::from_bps(500)));
//! assert_eq!(totals.tax.cents(), 1500);
//! assert_eq!(totals.total.cents(), 31500);
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Order, OrderItem, Rate};

// =============================================================================
// Inputs
// =============================================================================

/// Toggles and amounts that sit on top of the line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillInputs {
    pub discount: Money,
    pub tax_rate: Rate,
    pub include_tax: bool,
    pub service_charge_rate: Rate,
    pub include_service_charge: bool,
    pub tip: Money,
}

impl BillInputs {
    /// No discount, no tax, no service charge, no tip.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the discount already recorded on the order.
    pub fn for_order(order: &Order) -> Self {
        Self::new().discount(order.discount_or_zero())
    }

    pub fn discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    /// Enables tax at the given rate.
    pub fn tax(mut self, rate: Rate) -> Self {
        self.tax_rate = rate;
        self.include_tax = true;
        self
    }

    /// Keeps the configured rate but switches tax off.
    pub fn without_tax(mut self) -> Self {
        self.include_tax = false;
        self
    }

    /// Enables the service charge at the given rate.
    pub fn service_charge(mut self, rate: Rate) -> Self {
        self.service_charge_rate = rate;
        self.include_service_charge = true;
        self
    }

    pub fn without_service_charge(mut self) -> Self {
        self.include_service_charge = false;
        self
    }

    pub fn tip(mut self, tip: Money) -> Self {
        self.tip = tip;
        self
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Result of [`compute_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub discount: Money,
    pub tip: Money,
    pub total: Money,
}

impl BillTotals {
    /// Tax as two display halves (e.g. CGST + SGST).
    pub fn tax_split(&self) -> TaxSplit {
        TaxSplit::of(self.tax)
    }

    /// A negative total only happens when the discount exceeds what is owed.
    /// The calculator allows it; callers decide whether to submit.
    pub fn is_negative(&self) -> bool {
        self.total.is_negative()
    }
}

/// The single tax amount shown as two equal components.
///
/// Presentation only: the bill stores one tax value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TaxSplit {
    pub first: Money,
    pub second: Money,
}

impl TaxSplit {
    /// Splits `tax` so that `first + second == tax`; an odd paisa goes to
    /// `first`.
    pub fn of(tax: Money) -> Self {
        let (first, second) = tax.split_even();
        TaxSplit { first, second }
    }

    pub fn total(&self) -> Money {
        self.first + self.second
    }
}

// =============================================================================
// Calculation
// =============================================================================

/// Computes subtotal, tax, service charge and grand total.
///
/// Pure and deterministic; an empty item list yields all-zero totals (plus
/// any tip or negative discount passed in).
pub fn compute_totals(items: &[OrderItem], inputs: &BillInputs) -> BillTotals {
    let subtotal: Money = items.iter().map(OrderItem::line_total).sum();

    let tax = if inputs.include_tax {
        subtotal.apply_rate(inputs.tax_rate)
    } else {
        Money::zero()
    };

    let service_charge = if inputs.include_service_charge {
        subtotal.apply_rate(inputs.service_charge_rate)
    } else {
        Money::zero()
    };

    let total = subtotal - inputs.discount + tax + service_charge + inputs.tip;

    BillTotals {
        subtotal,
        tax,
        service_charge,
        discount: inputs.discount,
        tip: inputs.tip,
        total,
    }
}

/// Preview for an order using its recorded discount plus the given rates.
pub fn preview_order(order: &Order, inputs: &BillInputs) -> BillTotals {
    let inputs = BillInputs {
        discount: order.discount_or_zero(),
        ..*inputs
    };
    compute_totals(&order.items, &inputs)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderStatus;

    fn rupees(r: i64) -> Money {
        Money::from_major_minor(r, 0)
    }

    fn two_item_order() -> Vec<OrderItem> {
        vec![
            OrderItem::new("Butter Naan", 2, rupees(100)),
            OrderItem::new("Masala Chaas", 1, rupees(50)),
        ]
    }

    #[test]
    fn test_documented_scenario() {
        let totals = compute_totals(
            &two_item_order(),
            &BillInputs::new()
                .discount(rupees(20))
                .tax(Rate::from_bps(500))
                .service_charge(Rate::zero()),
        );

        assert_eq!(totals.subtotal, rupees(250));
        assert_eq!(totals.tax, Money::from_cents(1250));
        assert_eq!(totals.service_charge, Money::zero());
        assert_eq!(totals.total, Money::from_cents(24250));
    }

    #[test]
    fn test_no_extras_total_equals_subtotal() {
        let item_sets: Vec<Vec<OrderItem>> = vec![
            vec![],
            two_item_order(),
            vec![OrderItem::new("Biryani", 7, Money::from_cents(33333))],
            (1..=20)
                .map(|i| OrderItem::new(format!("Item {}", i), i, Money::from_cents(i * 101)))
                .collect(),
        ];

        for items in item_sets {
            let totals = compute_totals(&items, &BillInputs::new());
            assert_eq!(totals.total, totals.subtotal);
            let expected: i64 = items.iter().map(|i| i.unit_price.cents() * i.quantity).sum();
            assert_eq!(totals.subtotal.cents(), expected);
        }
    }

    #[test]
    fn test_rates_ignored_when_toggled_off() {
        let inputs = BillInputs::new()
            .tax(Rate::from_bps(1800))
            .service_charge(Rate::from_bps(1000))
            .without_tax()
            .without_service_charge();
        let totals = compute_totals(&two_item_order(), &inputs);

        assert!(totals.tax.is_zero());
        assert!(totals.service_charge.is_zero());
        assert_eq!(totals.total, rupees(250));
    }

    #[test]
    fn test_service_charge_and_tip() {
        let inputs = BillInputs::new()
            .service_charge(Rate::from_bps(1000))
            .tip(rupees(30));
        let totals = compute_totals(&two_item_order(), &inputs);

        assert_eq!(totals.service_charge, rupees(25));
        assert_eq!(totals.total, rupees(305));
    }

    #[test]
    fn test_empty_order_is_all_zero() {
        let inputs = BillInputs::new()
            .tax(Rate::from_bps(500))
            .service_charge(Rate::from_bps(1000));
        assert_eq!(compute_totals(&[], &inputs), BillTotals::default());
    }

    #[test]
    fn test_discount_above_subtotal_goes_negative() {
        let items = [OrderItem::new("Papad", 1, rupees(40))];
        let totals = compute_totals(&items, &BillInputs::new().discount(rupees(100)));

        assert_eq!(totals.total, rupees(-60));
        assert!(totals.is_negative());
    }

    #[test]
    fn test_tax_split_adds_back() {
        let totals = compute_totals(
            &[OrderItem::new("Kulfi", 1, Money::from_cents(10010))],
            &BillInputs::new().tax(Rate::from_bps(500)),
        );
        // 500.5 → 501 paise
        assert_eq!(totals.tax.cents(), 501);
        let split = totals.tax_split();
        assert_eq!(split.total(), totals.tax);
        assert_eq!(split.first.cents(), 251);
        assert_eq!(split.second.cents(), 250);
    }

    #[test]
    fn test_preview_uses_order_discount() {
        let order = Order {
            id: "ord-1".into(),
            table_number: 3,
            items: two_item_order(),
            status: OrderStatus::Served,
            discount: Some(rupees(20)),
            subtotal: None,
            tax: None,
        };
        let totals = preview_order(&order, &BillInputs::new().tax(Rate::from_bps(500)));
        assert_eq!(totals.total, Money::from_cents(24250));
    }
}
