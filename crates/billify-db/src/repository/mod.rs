//! # Repository Module
//!
//! Repository implementations for database access.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Repository Pattern                                 │
//! │                                                                         │
//! │  billify-engine (lifecycle)                                            │
//! │       │                                                                 │
//! │       │  "mark invoice X paid if still unpaid"                         │
//! │       ▼                                                                 │
//! │  Repository (this module)                                              │
//! │       │                                                                 │
//! │       │  Conditional UPDATE ... WHERE id = ? AND status = ?            │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • The status precondition and the write are ONE atomic statement      │
//! │  • Engine code reads like the state machine it implements              │
//! │  • Row structs isolate SQL shapes from domain types                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conditional Updates
//! Every status transition is a compare-and-swap: the UPDATE's WHERE clause
//! pins the expected source status, and `rows_affected` tells the caller
//! whether the transition applied (1) or was a no-op (0). Two overlapping
//! scheduler sweeps therefore cannot double-process a record.

use uuid::Uuid;

pub mod business;
pub mod client;
pub mod invoice;
pub mod product;
pub mod recurrence;

/// Generates a new UUID v4 entity id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
