//! # Validation Module
//!
//! Fail-fast validation of invoice creation input.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer (out of scope here)                            │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── Field coupling (recurrence pair, adjustment pairs)                │
//! │  ├── Positivity / emptiness checks                                     │
//! │  └── Resolves raw Options into typed Option<Adjustment> etc.           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints mirror the same rules                           │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: each layer catches what the previous one missed     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules run in the order the create operation documents them: the engine
//! checks referenced entities first (it owns the store), then hands the
//! draft here for the line-item, recurrence-coupling, and adjustment-coupling
//! rules. The first violation wins; nothing is partially applied.

use crate::error::ValidationError;
use crate::types::{Adjustment, AdjustmentMode, InvoiceDraft, RecurrenceTerms};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// The typed outcome of validating a draft: every optional pair resolved.
#[derive(Debug, Clone)]
pub struct ValidatedTerms {
    pub discount: Option<Adjustment>,
    pub tax: Option<Adjustment>,
    pub shipping_cents: i64,
    pub recurrence: Option<RecurrenceTerms>,
}

// =============================================================================
// Draft Validation
// =============================================================================

/// Validates an invoice draft and resolves its optional field pairs.
///
/// Does NOT touch the database: existence and ownership of the referenced
/// client/products are the engine's responsibility (it runs those checks
/// first, before calling this).
pub fn validate_draft(draft: &InvoiceDraft) -> ValidationResult<ValidatedTerms> {
    if draft.client_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "client_id".to_string(),
        });
    }

    if draft.line_items.is_empty() {
        return Err(ValidationError::EmptyLineItems);
    }

    if draft.line_items.len() > crate::MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line_items".to_string(),
            min: 1,
            max: crate::MAX_LINE_ITEMS as i64,
        });
    }

    for item in &draft.line_items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            });
        }
        if item.quantity < 1 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        if item.quantity > crate::MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: crate::MAX_ITEM_QUANTITY,
            });
        }
    }

    if draft.payment_terms_days <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment_terms_days".to_string(),
        });
    }

    let recurrence = resolve_recurrence(draft)?;
    let discount = resolve_adjustment("discount", draft.discount_amount, draft.discount_mode)?;
    let tax = resolve_adjustment("tax", draft.tax_amount, draft.tax_mode)?;

    let shipping_cents = draft.shipping_cents.unwrap_or(0);
    if shipping_cents < 0 {
        return Err(ValidationError::MustBePositive {
            field: "shipping_cents".to_string(),
        });
    }

    Ok(ValidatedTerms {
        discount,
        tax,
        shipping_cents,
        recurrence,
    })
}

/// Enforces the recurrence field coupling invariant:
/// recurring ⇒ interval > 0 and end date present;
/// non-recurring ⇒ neither present.
fn resolve_recurrence(draft: &InvoiceDraft) -> ValidationResult<Option<RecurrenceTerms>> {
    if !draft.recurring {
        if draft.recurrence_interval_days.is_some() || draft.recurrence_until.is_some() {
            return Err(ValidationError::RecurrenceMismatch {
                reason: "recurrence fields set on a non-recurring invoice".to_string(),
            });
        }
        return Ok(None);
    }

    let interval_days = draft
        .recurrence_interval_days
        .ok_or_else(|| ValidationError::RecurrenceMismatch {
            reason: "recurring invoice requires recurrence_interval_days".to_string(),
        })?;
    let until = draft
        .recurrence_until
        .ok_or_else(|| ValidationError::RecurrenceMismatch {
            reason: "recurring invoice requires recurrence_until".to_string(),
        })?;

    if interval_days <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "recurrence_interval_days".to_string(),
        });
    }

    Ok(Some(RecurrenceTerms {
        interval_days,
        until,
    }))
}

/// Enforces the adjustment coupling invariant for one field pair: amount
/// and mode must be set together. Percentage amounts are bounded to
/// [0, 10000] bps (0% to 100%); nominal amounts must be non-negative.
fn resolve_adjustment(
    field: &str,
    amount: Option<i64>,
    mode: Option<AdjustmentMode>,
) -> ValidationResult<Option<Adjustment>> {
    match (amount, mode) {
        (None, None) => Ok(None),
        (Some(amount), Some(mode)) => {
            match mode {
                AdjustmentMode::Nominal => {
                    if amount < 0 {
                        return Err(ValidationError::MustBePositive {
                            field: field.to_string(),
                        });
                    }
                }
                AdjustmentMode::Percentage => {
                    if !(0..=10000).contains(&amount) {
                        return Err(ValidationError::OutOfRange {
                            field: field.to_string(),
                            min: 0,
                            max: 10000,
                        });
                    }
                }
            }
            Ok(Some(Adjustment::from_parts(amount, mode)))
        }
        _ => Err(ValidationError::AdjustmentMismatch {
            field: field.to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DraftLineItem, PaymentMethod};
    use chrono::{TimeZone, Utc};

    fn base_draft() -> InvoiceDraft {
        InvoiceDraft {
            business_id: "biz-1".to_string(),
            client_id: "client-1".to_string(),
            invoice_date: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            payment_terms_days: 14,
            method: PaymentMethod::BankTransfer,
            line_items: vec![DraftLineItem {
                product_id: "prod-1".to_string(),
                quantity: 2,
            }],
            discount_amount: None,
            discount_mode: None,
            tax_amount: None,
            tax_mode: None,
            shipping_cents: None,
            recurring: false,
            recurrence_interval_days: None,
            recurrence_until: None,
        }
    }

    #[test]
    fn test_valid_draft() {
        let terms = validate_draft(&base_draft()).unwrap();
        assert!(terms.discount.is_none());
        assert!(terms.tax.is_none());
        assert!(terms.recurrence.is_none());
        assert_eq!(terms.shipping_cents, 0);
    }

    #[test]
    fn test_empty_line_items_rejected() {
        let mut draft = base_draft();
        draft.line_items.clear();
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::EmptyLineItems)
        ));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut draft = base_draft();
        draft.line_items[0].quantity = 0;
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_nonpositive_terms_rejected() {
        let mut draft = base_draft();
        draft.payment_terms_days = 0;
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn test_recurring_requires_both_fields() {
        let mut draft = base_draft();
        draft.recurring = true;
        draft.recurrence_interval_days = Some(30);
        // until missing
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::RecurrenceMismatch { .. })
        ));

        draft.recurrence_interval_days = None;
        draft.recurrence_until = Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::RecurrenceMismatch { .. })
        ));
    }

    #[test]
    fn test_non_recurring_rejects_stray_fields() {
        let mut draft = base_draft();
        draft.recurrence_interval_days = Some(30);
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::RecurrenceMismatch { .. })
        ));
    }

    #[test]
    fn test_recurring_interval_must_be_positive() {
        let mut draft = base_draft();
        draft.recurring = true;
        draft.recurrence_interval_days = Some(0);
        draft.recurrence_until = Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_recurring_resolves_terms() {
        let mut draft = base_draft();
        let until = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        draft.recurring = true;
        draft.recurrence_interval_days = Some(30);
        draft.recurrence_until = Some(until);

        let terms = validate_draft(&draft).unwrap();
        let recurrence = terms.recurrence.unwrap();
        assert_eq!(recurrence.interval_days, 30);
        assert_eq!(recurrence.until, until);
    }

    #[test]
    fn test_adjustment_requires_both_parts() {
        let mut draft = base_draft();
        draft.discount_amount = Some(1000);
        // mode missing
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::AdjustmentMismatch { .. })
        ));

        draft.discount_amount = None;
        draft.discount_mode = Some(AdjustmentMode::Percentage);
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::AdjustmentMismatch { .. })
        ));
    }

    #[test]
    fn test_percentage_adjustment_bounded() {
        let mut draft = base_draft();
        draft.tax_amount = Some(10001);
        draft.tax_mode = Some(AdjustmentMode::Percentage);
        assert!(matches!(
            validate_draft(&draft),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_adjustments_resolved() {
        let mut draft = base_draft();
        draft.discount_amount = Some(1000);
        draft.discount_mode = Some(AdjustmentMode::Percentage);
        draft.tax_amount = Some(500);
        draft.tax_mode = Some(AdjustmentMode::Nominal);
        draft.shipping_cents = Some(2000);

        let terms = validate_draft(&draft).unwrap();
        let discount = terms.discount.unwrap();
        assert_eq!(discount.mode(), AdjustmentMode::Percentage);
        assert_eq!(discount.raw_amount(), 1000);

        let tax = terms.tax.unwrap();
        assert_eq!(tax.mode(), AdjustmentMode::Nominal);
        assert_eq!(tax.raw_amount(), 500);

        assert_eq!(terms.shipping_cents, 2000);
    }
}
