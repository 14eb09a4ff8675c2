//! # Domain Types
//!
//! Core domain types used throughout Billify.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌────────────────────┐   │
//! │  │    Invoice      │   │ RecurringInstance│   │   InvoiceItem      │   │
//! │  │  ─────────────  │   │  ──────────────  │   │  ───────────────   │   │
//! │  │  id (UUID)      │   │  id (UUID)       │   │  id (UUID)         │   │
//! │  │  number         │   │  number          │   │  invoice_id (FK)   │   │
//! │  │  status         │   │  status          │   │  unit_price (snap) │   │
//! │  │  recurrence?    │   │  copied terms    │   │  quantity          │   │
//! │  └─────────────────┘   └──────────────────┘   └────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  BillingStatus  │   │   Adjustment    │   │ RecurrenceTerms │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Pending        │   │  Nominal(Money) │   │  interval_days  │       │
//! │  │  Unpaid         │   │  Percentage(..) │   │  until          │       │
//! │  │  Paid/Cancelled │   └─────────────────┘   └─────────────────┘       │
//! │  │  Expired        │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Invoices and instances have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `number`: human-readable invoice number, unique, client-facing
//!
//! ## Unrepresentable Invalid States
//! - An adjustment amount without a mode cannot exist: `Adjustment` is a
//!   tagged enum, carried as `Option<Adjustment>`.
//! - Recurrence fields on a non-recurring invoice cannot exist: interval
//!   and end date live together inside `Option<RecurrenceTerms>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};

// =============================================================================
// Billing Status
// =============================================================================

/// The lifecycle status shared by invoices and recurring instances.
///
/// ```text
/// pending ──dispatch──► unpaid ──mark paid──► paid ──(recurring)──► chain
///    │                    │  │
///    └──────cancel────────┘  └──due date passed──► expired
///                cancelled
/// ```
///
/// `Paid`, `Cancelled` and `Expired` are terminal: no transition leaves
/// them except recurrence chaining, which creates a *new* instance rather
/// than mutating the paid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    /// Created, not yet dispatched to the client.
    Pending,
    /// Sent to the client, awaiting payment.
    Unpaid,
    /// Payment received.
    Paid,
    /// Cancelled by the business or by an upstream deletion.
    Cancelled,
    /// Due date passed while still unpaid.
    Expired,
}

impl BillingStatus {
    /// Returns true if no further transitions are allowed from this status.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            BillingStatus::Paid | BillingStatus::Cancelled | BillingStatus::Expired
        )
    }

    /// Returns true if the record is still open (cancellable).
    pub const fn is_open(&self) -> bool {
        matches!(self, BillingStatus::Pending | BillingStatus::Unpaid)
    }

    /// The stored string form (matches the database CHECK constraint).
    pub const fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "pending",
            BillingStatus::Unpaid => "unpaid",
            BillingStatus::Paid => "paid",
            BillingStatus::Cancelled => "cancelled",
            BillingStatus::Expired => "expired",
        }
    }
}

impl Default for BillingStatus {
    fn default() -> Self {
        BillingStatus::Pending
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Direct bank transfer to the business account.
    BankTransfer,
    /// Card payment through an external processor.
    Card,
    /// Physical cash payment.
    Cash,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::BankTransfer
    }
}

// =============================================================================
// Adjustments (discount / tax)
// =============================================================================

/// How an adjustment amount is interpreted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// A fixed currency value in cents.
    Nominal,
    /// A percentage of a base amount, in basis points.
    Percentage,
}

/// A discount or tax adjustment: either a fixed amount or a percentage.
///
/// The amount and its mode travel together; an amount without a mode is
/// unrepresentable. Nominal amounts are cents, percentage amounts are
/// basis points (1100 = 11%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "amount", rename_all = "snake_case")]
pub enum Adjustment {
    Nominal(Money),
    Percentage(Rate),
}

impl Adjustment {
    /// Reassembles an adjustment from its stored parts.
    pub fn from_parts(amount: i64, mode: AdjustmentMode) -> Self {
        match mode {
            AdjustmentMode::Nominal => Adjustment::Nominal(Money::from_cents(amount)),
            AdjustmentMode::Percentage => Adjustment::Percentage(Rate::from_bps(amount as u32)),
        }
    }

    /// The mode tag (for storage).
    pub const fn mode(&self) -> AdjustmentMode {
        match self {
            Adjustment::Nominal(_) => AdjustmentMode::Nominal,
            Adjustment::Percentage(_) => AdjustmentMode::Percentage,
        }
    }

    /// The raw stored amount: cents for nominal, basis points for percentage.
    pub const fn raw_amount(&self) -> i64 {
        match self {
            Adjustment::Nominal(m) => m.cents(),
            Adjustment::Percentage(r) => r.bps() as i64,
        }
    }

    /// Resolves the adjustment against a base amount.
    ///
    /// Nominal adjustments ignore the base; percentage adjustments apply
    /// their rate to it with half-up rounding.
    pub fn amount_on(&self, base: Money) -> Money {
        match self {
            Adjustment::Nominal(m) => *m,
            Adjustment::Percentage(r) => r.applied_to(base),
        }
    }
}

// =============================================================================
// Recurrence Terms
// =============================================================================

/// The recurrence arrangement of an invoice template.
///
/// Present iff the invoice is recurring; interval and end date are never
/// separable. `interval_days` is validated > 0 at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceTerms {
    /// Days between billing cycles.
    pub interval_days: i64,
    /// No cycle may *start* after this date.
    pub until: DateTime<Utc>,
}

// =============================================================================
// Business / Client / Product
// =============================================================================

/// A registered business that issues invoices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A client of a business; the recipient of invoices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    /// The business this client belongs to.
    pub business_id: String,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// The client's preferred way to pay.
    pub preferred_method: PaymentMethod,
    /// Whether the client is active (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A priced product or service offered by a business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// The business this product belongs to.
    pub business_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Live price in cents. Invoices snapshot this at creation time.
    pub price_cents: i64,
    /// Whether the product is active (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the live price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice issued by a business to a client.
///
/// A recurring invoice acts as a *template*: its terms are copied into a
/// chain of [`RecurringInstance`] records, one per billing cycle, and its
/// own status mirrors the currently active instance's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub business_id: String,
    pub client_id: String,
    /// Human-readable invoice number, unique and client-facing.
    pub number: String,
    pub invoice_date: DateTime<Utc>,
    /// invoice_date + payment_terms_days.
    pub due_date: DateTime<Utc>,
    pub payment_terms_days: i64,
    pub method: PaymentMethod,
    pub status: BillingStatus,

    pub subtotal_cents: i64,
    pub discount: Option<Adjustment>,
    pub shipping_cents: i64,
    pub tax: Option<Adjustment>,
    pub total_cents: i64,

    /// Present iff this invoice is a recurring template.
    pub recurrence: Option<RecurrenceTerms>,
    /// The instance currently representing "this cycle"; exactly one at a
    /// time for a recurring invoice, always None otherwise.
    pub active_recurrence_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Returns true if this invoice is a recurring template.
    #[inline]
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Returns the subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the shipping cost as Money.
    #[inline]
    pub fn shipping(&self) -> Money {
        Money::from_cents(self.shipping_cents)
    }
}

// =============================================================================
// Invoice Item
// =============================================================================

/// A line item on an invoice.
/// Uses the snapshot pattern to freeze product data at creation time:
/// later product price or name edits never change an issued invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// Product name at creation time (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at creation time (frozen).
    pub unit_price_cents: i64,
    /// Quantity billed (>= 1).
    pub quantity: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Recurring Instance
// =============================================================================

/// One concrete billing cycle of a recurring invoice.
///
/// Carries its own number, dates and status, plus a frozen copy of the
/// parent's monetary terms at generation time. Cycles are NOT recomputed,
/// because product prices are not re-snapshotted per cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringInstance {
    pub id: String,
    /// The parent invoice template.
    pub invoice_id: String,
    /// This cycle's own client-facing number.
    pub number: String,
    pub invoice_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: BillingStatus,

    pub subtotal_cents: i64,
    pub discount: Option<Adjustment>,
    pub shipping_cents: i64,
    pub tax: Option<Adjustment>,
    pub total_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RecurringInstance {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Boundary DTOs
// =============================================================================

/// One requested line on a new invoice: which product and how many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftLineItem {
    pub product_id: String,
    pub quantity: i64,
}

/// The raw creation request as it arrives from the request layer.
///
/// Optional fields here are genuinely optional *pairs*: validation resolves
/// them into `Option<Adjustment>` / `Option<RecurrenceTerms>` and rejects
/// half-set pairs before any business logic runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDraft {
    /// Derived from the authenticated owner, never client-supplied.
    pub business_id: String,
    pub client_id: String,
    pub invoice_date: DateTime<Utc>,
    /// Days until the invoice is due (required, > 0).
    pub payment_terms_days: i64,
    pub method: PaymentMethod,
    pub line_items: Vec<DraftLineItem>,

    /// Cents when mode is nominal, basis points when percentage.
    pub discount_amount: Option<i64>,
    pub discount_mode: Option<AdjustmentMode>,
    /// Cents when mode is nominal, basis points when percentage.
    pub tax_amount: Option<i64>,
    pub tax_mode: Option<AdjustmentMode>,
    pub shipping_cents: Option<i64>,

    pub recurring: bool,
    pub recurrence_interval_days: Option<i64>,
    pub recurrence_until: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!BillingStatus::Pending.is_terminal());
        assert!(!BillingStatus::Unpaid.is_terminal());
        assert!(BillingStatus::Paid.is_terminal());
        assert!(BillingStatus::Cancelled.is_terminal());
        assert!(BillingStatus::Expired.is_terminal());

        assert!(BillingStatus::Pending.is_open());
        assert!(BillingStatus::Unpaid.is_open());
        assert!(!BillingStatus::Paid.is_open());
    }

    #[test]
    fn test_status_as_str_roundtrip() {
        assert_eq!(BillingStatus::Pending.as_str(), "pending");
        assert_eq!(BillingStatus::default(), BillingStatus::Pending);
        assert_eq!(format!("{}", BillingStatus::Expired), "expired");
    }

    #[test]
    fn test_adjustment_parts_roundtrip() {
        let nominal = Adjustment::from_parts(2500, AdjustmentMode::Nominal);
        assert_eq!(nominal.mode(), AdjustmentMode::Nominal);
        assert_eq!(nominal.raw_amount(), 2500);

        let pct = Adjustment::from_parts(1100, AdjustmentMode::Percentage);
        assert_eq!(pct.mode(), AdjustmentMode::Percentage);
        assert_eq!(pct.raw_amount(), 1100);
    }

    #[test]
    fn test_adjustment_amount_on() {
        let base = Money::from_cents(25000);

        let nominal = Adjustment::Nominal(Money::from_cents(2000));
        assert_eq!(nominal.amount_on(base).cents(), 2000);

        let pct = Adjustment::Percentage(Rate::from_bps(1000));
        assert_eq!(pct.amount_on(base).cents(), 2500);
    }

    #[test]
    fn test_adjustment_serde_tagging() {
        let adj = Adjustment::Percentage(Rate::from_bps(1100));
        let json = serde_json::to_string(&adj).unwrap();
        assert_eq!(json, r#"{"mode":"percentage","amount":1100}"#);
    }
}
