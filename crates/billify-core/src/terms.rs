//! # Terms Calculator
//!
//! Pure computation of invoice totals from line items and adjustment terms.
//!
//! ## The Fixed Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Totals Pipeline (load-bearing order)                 │
//! │                                                                         │
//! │  line items ──► subtotal = Σ(unit_price × quantity)                    │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  discount ──► after_discount = subtotal − discount_amount              │
//! │                     │           (discount applies to subtotal ONLY)    │
//! │                     ▼                                                   │
//! │  shipping ──► after_shipping = after_discount + shipping               │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  tax ───────► total = after_shipping + tax_amount                      │
//! │                        (tax is charged on subtotal − discount + ship)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reordering these steps silently changes the legally-significant total:
//! a percentage tax computed before shipping, or a discount applied after
//! shipping, produces a different number. Every caller and every test in
//! this workspace assumes exactly this order.
//!
//! ## Clamping
//! `compute_totals` does NOT clamp an oversized nominal discount; it is a
//! faithful calculator. The engine clamps at the boundary with
//! [`clamp_nominal_discount`] before a draft ever reaches this function.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::Adjustment;

// =============================================================================
// Inputs / Outputs
// =============================================================================

/// One priced line: a snapshotted unit price and a quantity.
#[derive(Debug, Clone, Copy)]
pub struct LineCharge {
    pub unit_price: Money,
    pub quantity: i64,
}

impl LineCharge {
    /// unit_price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Every intermediate of the totals pipeline, for storage and display.
///
/// Notification templates show the full breakdown, so we return all the
/// intermediates rather than just the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsBreakdown {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub after_discount: Money,
    pub after_shipping: Money,
    pub tax_amount: Money,
    pub total: Money,
}

// =============================================================================
// Computation
// =============================================================================

/// Sums line totals into a subtotal.
pub fn subtotal(lines: &[LineCharge]) -> Money {
    lines
        .iter()
        .fold(Money::zero(), |acc, line| acc + line.line_total())
}

/// Computes the full totals breakdown for a set of lines plus terms.
///
/// - `discount` applies to the product subtotal only (absent ⇒ 0)
/// - `shipping` is added before tax
/// - `tax` is therefore charged on (subtotal − discount + shipping)
///
/// ## Example
/// ```rust
/// use billify_core::money::{Money, Rate};
/// use billify_core::terms::{compute_totals, LineCharge};
/// use billify_core::types::Adjustment;
///
/// let lines = [
///     LineCharge { unit_price: Money::from_cents(10000), quantity: 2 },
///     LineCharge { unit_price: Money::from_cents(5000), quantity: 1 },
/// ];
/// let breakdown = compute_totals(
///     &lines,
///     Some(&Adjustment::Percentage(Rate::from_bps(1000))), // 10%
///     Money::from_cents(2000),
///     Some(&Adjustment::Percentage(Rate::from_bps(1100))), // 11%
/// );
/// assert_eq!(breakdown.subtotal.cents(), 25000);
/// assert_eq!(breakdown.discount_amount.cents(), 2500);
/// assert_eq!(breakdown.after_discount.cents(), 22500);
/// assert_eq!(breakdown.after_shipping.cents(), 24500);
/// assert_eq!(breakdown.tax_amount.cents(), 2695);
/// assert_eq!(breakdown.total.cents(), 27195);
/// ```
pub fn compute_totals(
    lines: &[LineCharge],
    discount: Option<&Adjustment>,
    shipping: Money,
    tax: Option<&Adjustment>,
) -> TermsBreakdown {
    let subtotal = subtotal(lines);

    let discount_amount = discount
        .map(|d| d.amount_on(subtotal))
        .unwrap_or_else(Money::zero);
    let after_discount = subtotal - discount_amount;

    let after_shipping = after_discount + shipping;

    let tax_amount = tax
        .map(|t| t.amount_on(after_shipping))
        .unwrap_or_else(Money::zero);
    let total = after_shipping + tax_amount;

    TermsBreakdown {
        subtotal,
        discount_amount,
        after_discount,
        after_shipping,
        tax_amount,
        total,
    }
}

/// Caps a nominal discount at the subtotal so `after_discount` can never go
/// negative. Percentage discounts pass through untouched (they are bounded
/// by validation instead).
pub fn clamp_nominal_discount(discount: Adjustment, subtotal: Money) -> Adjustment {
    match discount {
        Adjustment::Nominal(amount) => Adjustment::Nominal(amount.min(subtotal)),
        pct @ Adjustment::Percentage(_) => pct,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Rate;

    fn lines(specs: &[(i64, i64)]) -> Vec<LineCharge> {
        specs
            .iter()
            .map(|&(price, qty)| LineCharge {
                unit_price: Money::from_cents(price),
                quantity: qty,
            })
            .collect()
    }

    #[test]
    fn test_subtotal() {
        let lines = lines(&[(10000, 2), (5000, 1)]);
        assert_eq!(subtotal(&lines).cents(), 25000);
    }

    #[test]
    fn test_reference_scenario() {
        // 2 × 10000 + 1 × 5000, 10% discount, 2000 shipping, 11% tax
        let lines = lines(&[(10000, 2), (5000, 1)]);
        let breakdown = compute_totals(
            &lines,
            Some(&Adjustment::Percentage(Rate::from_bps(1000))),
            Money::from_cents(2000),
            Some(&Adjustment::Percentage(Rate::from_bps(1100))),
        );

        assert_eq!(breakdown.subtotal.cents(), 25000);
        assert_eq!(breakdown.discount_amount.cents(), 2500);
        assert_eq!(breakdown.after_discount.cents(), 22500);
        assert_eq!(breakdown.after_shipping.cents(), 24500);
        assert_eq!(breakdown.tax_amount.cents(), 2695);
        assert_eq!(breakdown.total.cents(), 27195);
    }

    #[test]
    fn test_absent_terms_are_zero() {
        let lines = lines(&[(1099, 3)]);
        let breakdown = compute_totals(&lines, None, Money::zero(), None);

        assert_eq!(breakdown.subtotal.cents(), 3297);
        assert_eq!(breakdown.discount_amount.cents(), 0);
        assert_eq!(breakdown.after_discount.cents(), 3297);
        assert_eq!(breakdown.after_shipping.cents(), 3297);
        assert_eq!(breakdown.tax_amount.cents(), 0);
        assert_eq!(breakdown.total.cents(), 3297);
    }

    #[test]
    fn test_nominal_discount_and_tax() {
        let lines = lines(&[(20000, 1)]);
        let breakdown = compute_totals(
            &lines,
            Some(&Adjustment::Nominal(Money::from_cents(3000))),
            Money::from_cents(500),
            Some(&Adjustment::Nominal(Money::from_cents(700))),
        );

        assert_eq!(breakdown.after_discount.cents(), 17000);
        assert_eq!(breakdown.after_shipping.cents(), 17500);
        assert_eq!(breakdown.total.cents(), 18200);
    }

    #[test]
    fn test_tax_base_includes_shipping_but_not_discount() {
        // Percentage tax must be computed on (subtotal − discount + shipping),
        // not on the raw subtotal and not before shipping.
        let lines = lines(&[(10000, 1)]);
        let breakdown = compute_totals(
            &lines,
            Some(&Adjustment::Nominal(Money::from_cents(2000))),
            Money::from_cents(1000),
            Some(&Adjustment::Percentage(Rate::from_bps(1000))), // 10%
        );

        // base = 10000 - 2000 + 1000 = 9000; 10% of 9000 = 900
        assert_eq!(breakdown.tax_amount.cents(), 900);
        assert_eq!(breakdown.total.cents(), 9900);
    }

    #[test]
    fn test_clamp_nominal_discount() {
        let subtotal = Money::from_cents(5000);

        let oversized = Adjustment::Nominal(Money::from_cents(9000));
        assert_eq!(
            clamp_nominal_discount(oversized, subtotal),
            Adjustment::Nominal(Money::from_cents(5000))
        );

        let fitting = Adjustment::Nominal(Money::from_cents(1000));
        assert_eq!(clamp_nominal_discount(fitting, subtotal), fitting);

        let pct = Adjustment::Percentage(Rate::from_bps(5000));
        assert_eq!(clamp_nominal_discount(pct, subtotal), pct);
    }

    #[test]
    fn test_empty_lines() {
        let breakdown = compute_totals(&[], None, Money::zero(), None);
        assert_eq!(breakdown.total.cents(), 0);
    }
}
