//! # Scheduler Jobs
//!
//! Two background sweeps keep the lifecycle moving without anyone asking:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DispatchJob (every 5 min)          ExpiryJob (every 10 min)           │
//! │  ─────────────────────────          ────────────────────────           │
//! │  pending, dated today               unpaid, due before today           │
//! │       │                                  │                             │
//! │       ▼                                  ▼                             │
//! │  mark sent + notice                 mark expired + notice              │
//! │                                                                         │
//! │  Both sweeps are idempotent: the underlying transitions are           │
//! │  compare-and-set, so a record processed by one tick is silently       │
//! │  skipped by the next. One bad record never aborts a sweep.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each job owns its loop and exposes a handle with a shutdown channel;
//! `run()` should be spawned as a background task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use billify_db::Database;

use crate::clock::{day_bounds, Clock};
use crate::config::SchedulerConfig;
use crate::error::EngineResult;
use crate::lifecycle::LifecycleEngine;

// =============================================================================
// Dispatch Job
// =============================================================================

/// Outcome of one dispatch sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Non-recurring invoices dispatched.
    pub invoices_sent: usize,
    /// Recurring instances dispatched.
    pub instances_sent: usize,
    /// Records skipped because their status had already moved on.
    pub skipped: usize,
    /// Records that errored; logged and left for the next tick.
    pub failures: usize,
}

/// Sweeps pending invoices and instances dated today and dispatches them.
pub struct DispatchJob {
    db: Arc<Database>,
    engine: LifecycleEngine,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running job.
pub struct JobHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl JobHandle {
    /// Signals the job loop to stop after its current tick.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl DispatchJob {
    /// Creates a dispatch job and its shutdown handle.
    pub fn new(
        db: Arc<Database>,
        engine: LifecycleEngine,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> (Self, JobHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let job = DispatchJob {
            db,
            engine,
            clock,
            config,
            shutdown_rx,
        };
        (job, JobHandle { shutdown_tx })
    }

    /// Runs the dispatch loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.config.dispatch_interval, "Dispatch job starting");

        let mut interval = tokio::time::interval(self.config.dispatch_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(report) if report == DispatchReport::default() => {
                            debug!("Dispatch sweep found nothing due");
                        }
                        Ok(report) => {
                            info!(
                                invoices = report.invoices_sent,
                                instances = report.instances_sent,
                                skipped = report.skipped,
                                failures = report.failures,
                                "Dispatch sweep finished"
                            );
                        }
                        Err(e) => error!(error = %e, "Dispatch sweep failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Dispatch job shutting down");
                    break;
                }
            }
        }

        info!("Dispatch job stopped");
    }

    /// One dispatch pass over everything dated today (business-local).
    pub async fn sweep(&self) -> EngineResult<DispatchReport> {
        let now = self.clock.now();
        let (start, end) = day_bounds(now, self.config.utc_offset_minutes);
        let mut report = DispatchReport::default();

        for invoice in self.db.invoices().due_for_dispatch(start, end).await? {
            match self.engine.dispatch_invoice(&invoice).await {
                Ok(true) => report.invoices_sent += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(id = %invoice.id, error = %e, "Failed to dispatch invoice");
                }
            }
        }

        for instance in self.db.recurrences().due_for_dispatch(start, end).await? {
            match self.engine.dispatch_instance(&instance).await {
                Ok(true) => report.instances_sent += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(id = %instance.id, error = %e, "Failed to dispatch instance");
                }
            }
        }

        Ok(report)
    }
}

// =============================================================================
// Expiry Job
// =============================================================================

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    /// Non-recurring invoices expired.
    pub invoices_expired: usize,
    /// Recurring instances expired.
    pub instances_expired: usize,
    /// Records skipped because their status had already moved on.
    pub skipped: usize,
    /// Records that errored; logged and left for the next tick.
    pub failures: usize,
}

/// Sweeps unpaid invoices and instances past their due date and expires them.
pub struct ExpiryJob {
    db: Arc<Database>,
    engine: LifecycleEngine,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ExpiryJob {
    /// Creates an expiry job and its shutdown handle.
    pub fn new(
        db: Arc<Database>,
        engine: LifecycleEngine,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> (Self, JobHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let job = ExpiryJob {
            db,
            engine,
            clock,
            config,
            shutdown_rx,
        };
        (job, JobHandle { shutdown_tx })
    }

    /// Runs the expiry loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.config.expiry_interval, "Expiry job starting");

        let mut interval = tokio::time::interval(self.config.expiry_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(report) if report == ExpiryReport::default() => {
                            debug!("Expiry sweep found nothing overdue");
                        }
                        Ok(report) => {
                            info!(
                                invoices = report.invoices_expired,
                                instances = report.instances_expired,
                                skipped = report.skipped,
                                failures = report.failures,
                                "Expiry sweep finished"
                            );
                        }
                        Err(e) => error!(error = %e, "Expiry sweep failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Expiry job shutting down");
                    break;
                }
            }
        }

        info!("Expiry job stopped");
    }

    /// One expiry pass. The cutoff is the start of the current business-local
    /// day, so an invoice stays payable for the whole of its due day and only
    /// expires on the first sweep of the following day.
    pub async fn sweep(&self) -> EngineResult<ExpiryReport> {
        let (cutoff, _) = day_bounds(self.clock.now(), self.config.utc_offset_minutes);
        let mut report = ExpiryReport::default();

        for invoice in self.db.invoices().due_for_expiry(cutoff).await? {
            match self.engine.expire_invoice(&invoice).await {
                Ok(true) => report.invoices_expired += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(id = %invoice.id, error = %e, "Failed to expire invoice");
                }
            }
        }

        for instance in self.db.recurrences().due_for_expiry(cutoff).await? {
            match self.engine.expire_instance(&instance).await {
                Ok(true) => report.instances_expired += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failures += 1;
                    error!(id = %instance.id, error = %e, "Failed to expire instance");
                }
            }
        }

        Ok(report)
    }
}
