//! # billify-engine: Invoice Lifecycle Engine
//!
//! The orchestration layer of Billify: owns every status mutation, runs the
//! background scheduler jobs, and pushes notices through the notification
//! port.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Billify Engine Flow                               │
//! │                                                                         │
//! │  Request layer                     Scheduler                           │
//! │  create / mark_paid / cancel       DispatchJob (5 min)                 │
//! │       │                            ExpiryJob   (10 min)               │
//! │       │                                 │                              │
//! │       ▼                                 ▼                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 billify-engine (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌───────────┐   ┌──────────────────────┐  │   │
//! │  │   │ LifecycleEngine  │   jobs    │   │  Notifier port       │  │   │
//! │  │   │ (lifecycle.rs)│  │ (jobs.rs) │   │  (notify.rs)         │  │   │
//! │  │   └──────┬───────┘   └─────┬─────┘   └──────────▲───────────┘  │   │
//! │  │          │                 │                    │              │   │
//! │  │          └────────┬────────┘          commit-then-notify      │   │
//! │  └───────────────────┼─────────────────────────────────────────────┘   │
//! │                      ▼                                                  │
//! │        billify-core (rules)  +  billify-db (storage)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`lifecycle`] - Creation, transitions, recurrence chaining
//! - [`jobs`] - Dispatch and expiry background sweeps
//! - [`notify`] - The outbound notification port
//! - [`clock`] - Injectable time source
//! - [`config`] - Scheduler cadence and timezone settings
//! - [`error`] - Engine error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use billify_db::{Database, DbConfig};
//! use billify_engine::clock::SystemClock;
//! use billify_engine::config::SchedulerConfig;
//! use billify_engine::jobs::{DispatchJob, ExpiryJob};
//! use billify_engine::lifecycle::LifecycleEngine;
//! use billify_engine::notify::NoopNotifier;
//!
//! let db = Arc::new(Database::new(DbConfig::new("billify.db")).await?);
//! let clock = Arc::new(SystemClock);
//! let engine = LifecycleEngine::new(db.clone(), Arc::new(NoopNotifier), clock.clone(), 0);
//!
//! let (dispatch, dispatch_handle) =
//!     DispatchJob::new(db.clone(), engine.clone(), clock.clone(), SchedulerConfig::default());
//! tokio::spawn(dispatch.run());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod notify;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SchedulerConfig;
pub use error::{EngineError, EngineResult};
pub use jobs::{DispatchJob, DispatchReport, ExpiryJob, ExpiryReport, JobHandle};
pub use lifecycle::LifecycleEngine;
pub use notify::{DeliveryError, InvoiceNotice, NoticeKind, NoticeLine, NoopNotifier, Notifier};
