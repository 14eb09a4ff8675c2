//! # billify-db: Database Layer for Billify
//!
//! This crate provides database access for the Billify invoicing engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Billify Data Flow                                │
//! │                                                                         │
//! │  billify-engine (LifecycleEngine, scheduler jobs)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    billify-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (invoice.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ InvoiceRepo   │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │◄───│ RecurrenceRepo│    │ ...          │  │   │
//! │  │   │ Management    │    │ ClientRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                      SQLite Database (WAL)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (invoice, recurrence, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use billify_db::{Database, DbConfig};
//!
//! // Create database with default config (migrations run on startup)
//! let config = DbConfig::new("path/to/billify.db");
//! let db = Database::new(config).await?;
//!
//! // Use repositories
//! let invoice = db.invoices().get_by_id(&id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::generate_id;

// Repository re-exports for convenience
pub use repository::business::BusinessRepository;
pub use repository::client::ClientRepository;
pub use repository::invoice::{generate_invoice_number, InvoiceRepository};
pub use repository::product::ProductRepository;
pub use repository::recurrence::RecurrenceRepository;
