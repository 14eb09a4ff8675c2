//! # billify-core: Pure Business Logic for Billify
//!
//! This crate is the **heart** of Billify. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Billify Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Request layer (out of scope)                 │   │
//! │  │    create invoice, mark paid, cancel, soft delete              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    billify-engine                               │   │
//! │  │    lifecycle state machine, scheduler jobs, notification port   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ billify-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   terms   │  │ validation│  │   │
//! │  │   │  Invoice  │  │   Money   │  │  totals   │  │   rules   │  │   │
//! │  │   │  Status   │  │   Rate    │  │ pipeline  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    billify-db (Database Layer)                  │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Invoice, RecurringInstance, Client, ...)
//! - [`money`] - Money and Rate types with integer arithmetic (no floats!)
//! - [`terms`] - The totals pipeline: subtotal → discount → shipping → tax
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are in cents (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use billify_core::money::{Money, Rate};
//! use billify_core::terms::{compute_totals, LineCharge};
//! use billify_core::types::Adjustment;
//!
//! let lines = [LineCharge { unit_price: Money::from_cents(10000), quantity: 2 }];
//! let breakdown = compute_totals(
//!     &lines,
//!     Some(&Adjustment::Percentage(Rate::from_bps(1000))),
//!     Money::zero(),
//!     None,
//! );
//! assert_eq!(breakdown.total.cents(), 18000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod terms;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use billify_core::Money` instead of
// `use billify_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use terms::{clamp_nominal_discount, compute_totals, LineCharge, TermsBreakdown};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on a single invoice.
///
/// ## Business Reason
/// Prevents runaway requests and keeps notification bodies reasonable.
/// Can be made configurable per-business in future versions.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-billing (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
