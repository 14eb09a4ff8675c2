//! # Error Types
//!
//! Domain-specific error types for billify-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  billify-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  billify-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  billify-engine errors (separate crate)                                │
//! │  ├── EngineError      - Lifecycle operation failures                   │
//! │  └── DeliveryError    - Notification send failures (never roll back    │
//! │                         a committed transition)                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → request layer       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (entity, id, current status)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::BillingStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These map one-to-one onto the request layer's response taxonomy:
/// NotFound → 404, Forbidden → 403, Conflict → 409, Validation → 422.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist (or is soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A referenced entity exists but belongs to a different business.
    ///
    /// Deliberately carries the same information as NotFound so callers
    /// can collapse the two without leaking cross-tenant existence.
    #[error("{entity} {id} does not belong to the requesting business")]
    Forbidden { entity: String, id: String },

    /// The requested transition is illegal from the record's current status.
    ///
    /// ## When This Occurs
    /// - Marking paid an invoice that is pending or already terminal
    /// - Cancelling a paid/cancelled/expired invoice
    /// - Soft-deleting anything that has ever been dispatched
    #[error("{entity} {id} is {current}, cannot {operation}")]
    Conflict {
        entity: String,
        id: String,
        current: BillingStatus,
        operation: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Forbidden error for a given entity type and ID.
    pub fn forbidden(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::Forbidden {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error describing a rejected transition.
    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        current: BillingStatus,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::Conflict {
            entity: entity.into(),
            id: id.into(),
            current,
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised fail-fast at the boundary of `create`: the first violated rule
/// wins, nothing is ever partially applied.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// An invoice needs at least one line item.
    #[error("invoice must have at least one line item")]
    EmptyLineItems,

    /// Recurrence fields set on a non-recurring invoice, or missing on a
    /// recurring one.
    #[error("recurrence fields mismatch: {reason}")]
    RecurrenceMismatch { reason: String },

    /// An adjustment amount without a mode, or a mode without an amount.
    #[error("{field} amount and mode must be set together")]
    AdjustmentMismatch { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::conflict("Invoice", "inv-1", BillingStatus::Paid, "mark paid");
        assert_eq!(err.to_string(), "Invoice inv-1 is paid, cannot mark paid");

        let err = CoreError::not_found("Client", "c-404");
        assert_eq!(err.to_string(), "Client not found: c-404");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::EmptyLineItems;
        assert_eq!(err.to_string(), "invoice must have at least one line item");

        let err = ValidationError::AdjustmentMismatch {
            field: "discount".to_string(),
        };
        assert_eq!(err.to_string(), "discount amount and mode must be set together");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "client_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
