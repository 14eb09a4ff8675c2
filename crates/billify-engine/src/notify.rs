//! # Notification Port
//!
//! Outbound notification boundary: the engine emits notices about lifecycle
//! events, a [`Notifier`] implementation delivers them (email, webhook,
//! message queue, whatever the deployment wires in).
//!
//! ## Delivery Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Status transition COMMITS first, notice is sent after.               │
//! │                                                                         │
//! │  COMMIT ──► send(kind, notice) ──► Ok  ─► done                         │
//! │                        │                                                │
//! │                        └─────────► Err ─► logged with invoice number,  │
//! │                                           transition stands            │
//! │                                                                         │
//! │  A failed delivery is an observability problem, never a rollback.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use billify_core::{BillingStatus, PaymentMethod};

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// An invoice or instance was dispatched and is now awaiting payment.
    InvoiceIssued,
    /// An open invoice or instance was cancelled.
    InvoiceCancelled,
    /// An unpaid invoice or instance passed its due date.
    InvoiceExpired,
    /// A recurring arrangement reached its end date; no further cycles.
    RecurrenceStopped,
}

/// One rendered line of the invoice body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// The payload handed to the notifier.
///
/// Carries enough to render a message without a database round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceNotice {
    /// The invoice (or parent template) id.
    pub invoice_id: String,
    /// The client-facing number of the invoice or instance.
    pub number: String,
    pub business_name: String,
    pub client_name: String,
    pub client_email: String,
    pub status: BillingStatus,
    pub method: PaymentMethod,
    pub lines: Vec<NoticeLine>,
    pub total_cents: i64,
    pub due_date: chrono::DateTime<chrono::Utc>,
    /// Present on cancellation notices; differentiates the message copy
    /// (user cancellation vs cascade from a client/product removal).
    pub reason: Option<String>,
}

/// Notification delivery failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The downstream channel rejected or dropped the notice.
    #[error("notice rejected by {channel}: {reason}")]
    Rejected { channel: String, reason: String },

    /// The downstream channel is unreachable.
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification port.
///
/// Synchronous and object safe: the engine holds an `Arc<dyn Notifier>`
/// and calls it after each committed transition. Implementations that
/// need async delivery should enqueue here and deliver elsewhere.
pub trait Notifier: Send + Sync {
    /// Delivers one notice. Errors are logged by the caller, never retried
    /// by the engine itself.
    fn send(&self, kind: NoticeKind, notice: &InvoiceNotice) -> Result<(), DeliveryError>;
}

/// A notifier that drops everything. Default for tests and for deployments
/// that have not wired a delivery channel yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _kind: NoticeKind, _notice: &InvoiceNotice) -> Result<(), DeliveryError> {
        Ok(())
    }
}
