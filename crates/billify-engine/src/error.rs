//! # Engine Error Types
//!
//! The top of the error hierarchy: everything below (core rules, database,
//! notification delivery) converges here before reaching the request layer.

use thiserror::Error;

use billify_core::CoreError;
use billify_db::DbError;

use crate::notify::DeliveryError;

/// Lifecycle engine errors.
///
/// ## Taxonomy
/// ```text
/// Core(NotFound)   → 404    Core(Forbidden) → 403
/// Core(Conflict)   → 409    Core(Validation) → 422
/// Db(_)            → 500    Delivery(_)      → logged, never surfaced
/// ```
///
/// Delivery errors appear here only from explicit send paths; the engine
/// never rolls back a committed transition because a notice failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database layer failed.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A notification could not be delivered.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
