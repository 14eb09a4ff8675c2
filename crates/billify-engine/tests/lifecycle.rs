//! End-to-end lifecycle tests against an in-memory database.
//!
//! Exercises the full path: draft → validation → snapshot → totals →
//! persistence → dispatch/expiry sweeps → payment and chaining, with a
//! recording notifier and a manual clock.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use billify_core::{
    AdjustmentMode, BillingStatus, Business, Client, CoreError, DraftLineItem, InvoiceDraft,
    PaymentMethod, Product,
};
use billify_db::{generate_id, Database, DbConfig};
use billify_engine::config::SchedulerConfig;
use billify_engine::jobs::{DispatchJob, ExpiryJob};
use billify_engine::notify::{DeliveryError, InvoiceNotice, NoticeKind, Notifier};
use billify_engine::{EngineError, LifecycleEngine, ManualClock};

// =============================================================================
// Test fixtures
// =============================================================================

/// Captures every notice instead of delivering it.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(NoticeKind, InvoiceNotice)>>,
}

impl RecordingNotifier {
    fn kinds(&self) -> Vec<NoticeKind> {
        self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    fn last(&self) -> Option<(NoticeKind, InvoiceNotice)> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, kind: NoticeKind, notice: &InvoiceNotice) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((kind, notice.clone()));
        Ok(())
    }
}

struct Harness {
    db: Arc<Database>,
    engine: LifecycleEngine,
    notifier: Arc<RecordingNotifier>,
    clock: ManualClock,
    business_id: String,
    client_id: String,
    product_id: String,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

/// Opt-in tracing output for debugging, e.g. `RUST_LOG=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn harness() -> Harness {
    init_tracing();
    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    let clock = ManualClock::new(t0());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = LifecycleEngine::new(
        db.clone(),
        notifier.clone(),
        Arc::new(clock.clone()),
        0,
    );

    let now = t0();
    let business = Business {
        id: generate_id(),
        name: "Acme Services".to_string(),
        email: "billing@acme.test".to_string(),
        address: None,
        phone: None,
        created_at: now,
        updated_at: now,
    };
    db.businesses().insert(&business).await.unwrap();

    let client = Client {
        id: generate_id(),
        business_id: business.id.clone(),
        name: "Globex".to_string(),
        email: "ap@globex.test".to_string(),
        address: None,
        phone: None,
        preferred_method: PaymentMethod::BankTransfer,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.clients().insert(&client).await.unwrap();

    let product = Product {
        id: generate_id(),
        business_id: business.id.clone(),
        name: "Consulting Day".to_string(),
        description: None,
        price_cents: 12500,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();

    Harness {
        db,
        engine,
        notifier,
        clock,
        business_id: business.id,
        client_id: client.id,
        product_id: product.id,
    }
}

impl Harness {
    /// A draft for 2 × 12500 with 10% discount, 2000 shipping, 11% tax.
    fn base_draft(&self, invoice_date: DateTime<Utc>) -> InvoiceDraft {
        InvoiceDraft {
            business_id: self.business_id.clone(),
            client_id: self.client_id.clone(),
            invoice_date,
            payment_terms_days: 14,
            method: PaymentMethod::BankTransfer,
            line_items: vec![DraftLineItem {
                product_id: self.product_id.clone(),
                quantity: 2,
            }],
            discount_amount: Some(1000),
            discount_mode: Some(AdjustmentMode::Percentage),
            tax_amount: Some(1100),
            tax_mode: Some(AdjustmentMode::Percentage),
            shipping_cents: Some(2000),
            recurring: false,
            recurrence_interval_days: None,
            recurrence_until: None,
        }
    }

    fn recurring_draft(
        &self,
        invoice_date: DateTime<Utc>,
        interval_days: i64,
        until: DateTime<Utc>,
    ) -> InvoiceDraft {
        let mut draft = self.base_draft(invoice_date);
        draft.recurring = true;
        draft.recurrence_interval_days = Some(interval_days);
        draft.recurrence_until = Some(until);
        draft
    }
}

// =============================================================================
// Creation and totals
// =============================================================================

#[tokio::test]
async fn create_computes_totals_in_fixed_order() {
    let h = harness().await;
    // Future date so the invoice is not dispatched immediately.
    let invoice = h
        .engine
        .create(&h.base_draft(t0() + Duration::days(3)))
        .await
        .unwrap();

    // 25000 − 10% = 22500, + 2000 shipping = 24500, + 11% tax = 27195
    assert_eq!(invoice.subtotal_cents, 25000);
    assert_eq!(invoice.shipping_cents, 2000);
    assert_eq!(invoice.total_cents, 27195);
    assert_eq!(invoice.status, BillingStatus::Pending);
    assert!(invoice.sent_at.is_none());
    assert_eq!(invoice.due_date, invoice.invoice_date + Duration::days(14));
    assert!(invoice.number.starts_with("INV-20260302-"));

    let items = h.db.invoices().items(&invoice.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name_snapshot, "Consulting Day");
    assert_eq!(items[0].unit_price_cents, 12500);
    assert_eq!(items[0].line_total_cents, 25000);

    assert!(h.notifier.kinds().is_empty());
}

#[tokio::test]
async fn create_rejects_empty_line_items() {
    let h = harness().await;
    let mut draft = h.base_draft(t0());
    draft.line_items.clear();

    let err = h.engine.create(&draft).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn create_reports_missing_client_before_field_rules() {
    let h = harness().await;
    let mut draft = h.base_draft(t0());
    draft.client_id = generate_id(); // nonexistent
    draft.line_items.clear(); // would also fail validation

    // The entity check wins over the field rules.
    let err = h.engine.create(&draft).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn create_rejects_foreign_client() {
    let h = harness().await;
    let mut draft = h.base_draft(t0());
    draft.business_id = generate_id(); // some other tenant

    let err = h.engine.create(&draft).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::Forbidden { .. })));
}

#[tokio::test]
async fn nominal_discount_is_clamped_to_subtotal() {
    let h = harness().await;
    let mut draft = h.base_draft(t0() + Duration::days(3));
    draft.discount_amount = Some(999_999);
    draft.discount_mode = Some(AdjustmentMode::Nominal);

    let invoice = h.engine.create(&draft).await.unwrap();

    // Discount capped at the 25000 subtotal: 0 + 2000 shipping, + 11% tax.
    assert_eq!(invoice.subtotal_cents, 25000);
    assert_eq!(invoice.discount.unwrap().raw_amount(), 25000);
    assert_eq!(invoice.total_cents, 2220);
}

#[tokio::test]
async fn same_day_invoice_dispatches_immediately() {
    let h = harness().await;
    let invoice = h.engine.create(&h.base_draft(t0())).await.unwrap();

    assert_eq!(invoice.status, BillingStatus::Unpaid);
    assert!(invoice.sent_at.is_some());
    assert_eq!(h.notifier.kinds(), vec![NoticeKind::InvoiceIssued]);

    let (_, notice) = h.notifier.last().unwrap();
    assert_eq!(notice.status, BillingStatus::Unpaid);
    assert_eq!(notice.total_cents, 27195);
    assert_eq!(notice.client_email, "ap@globex.test");
}

// =============================================================================
// Scheduler sweeps
// =============================================================================

#[tokio::test]
async fn dispatch_sweep_sends_due_invoices_once() {
    let h = harness().await;
    let invoice = h
        .engine
        .create(&h.base_draft(t0() + Duration::days(1)))
        .await
        .unwrap();
    assert_eq!(invoice.status, BillingStatus::Pending);

    let (job, _handle) = DispatchJob::new(
        h.db.clone(),
        h.engine.clone(),
        Arc::new(h.clock.clone()),
        SchedulerConfig::default(),
    );

    // Not due today.
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_sent, 0);

    h.clock.advance(Duration::days(1));
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_sent, 1);

    let sent = h.db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
    assert_eq!(sent.status, BillingStatus::Unpaid);

    // Second sweep finds nothing: the CAS already moved the record on.
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_sent, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(h.notifier.kinds(), vec![NoticeKind::InvoiceIssued]);
}

#[tokio::test]
async fn expiry_sweep_expires_overdue_invoices_once() {
    let h = harness().await;
    let invoice = h.engine.create(&h.base_draft(t0())).await.unwrap();
    assert_eq!(invoice.status, BillingStatus::Unpaid);

    let (job, _handle) = ExpiryJob::new(
        h.db.clone(),
        h.engine.clone(),
        Arc::new(h.clock.clone()),
        SchedulerConfig::default(),
    );

    // Still within terms.
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_expired, 0);

    h.clock.advance(Duration::days(15));
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_expired, 1);

    let expired = h.db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
    assert_eq!(expired.status, BillingStatus::Expired);
    assert_eq!(
        h.notifier.kinds(),
        vec![NoticeKind::InvoiceIssued, NoticeKind::InvoiceExpired]
    );

    // Idempotent.
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_expired, 0);
}

#[tokio::test]
async fn invoice_stays_payable_through_its_due_day() {
    let h = harness().await;
    // Due 2026-03-16 10:00.
    let invoice = h.engine.create(&h.base_draft(t0())).await.unwrap();

    let (job, _handle) = ExpiryJob::new(
        h.db.clone(),
        h.engine.clone(),
        Arc::new(h.clock.clone()),
        SchedulerConfig::default(),
    );

    // Midday on the due day: the due timestamp has passed, but the cutoff
    // is the start of today, so the invoice is still payable.
    h.clock.set(Utc.with_ymd_and_hms(2026, 3, 16, 12, 0, 0).unwrap());
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_expired, 0);
    let open = h.db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
    assert_eq!(open.status, BillingStatus::Unpaid);

    // First sweep of the following day expires it.
    h.clock.set(Utc.with_ymd_and_hms(2026, 3, 17, 0, 5, 0).unwrap());
    let report = job.sweep().await.unwrap();
    assert_eq!(report.invoices_expired, 1);
}

// =============================================================================
// Payment and terminal states
// =============================================================================

#[tokio::test]
async fn paid_is_terminal() {
    let h = harness().await;
    let invoice = h.engine.create(&h.base_draft(t0())).await.unwrap();

    let paid = h.engine.mark_paid(&invoice.id).await.unwrap();
    assert_eq!(paid.status, BillingStatus::Paid);
    assert!(paid.paid_at.is_some());

    // Paying again or cancelling a paid invoice is a conflict.
    let err = h.engine.mark_paid(&invoice.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::Conflict {
            current: BillingStatus::Paid,
            ..
        })
    ));
    let err = h.engine.cancel(&invoice.id, "no longer needed").await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::Conflict { .. })));
}

#[tokio::test]
async fn cancel_sends_a_notice_carrying_the_reason() {
    let h = harness().await;
    let invoice = h.engine.create(&h.base_draft(t0())).await.unwrap();

    let cancelled = h.engine.cancel(&invoice.id, "ordered by mistake").await.unwrap();
    assert_eq!(cancelled.status, BillingStatus::Cancelled);

    let (kind, notice) = h.notifier.last().unwrap();
    assert_eq!(kind, NoticeKind::InvoiceCancelled);
    // The payload carries the post-transition status, not the one the
    // invoice had when cancellation was requested.
    assert_eq!(notice.status, BillingStatus::Cancelled);
    assert_eq!(notice.reason.as_deref(), Some("ordered by mistake"));
    assert_eq!(notice.lines.len(), 1);
    assert_eq!(notice.lines[0].name, "Consulting Day");
}

#[tokio::test]
async fn pending_invoice_cannot_be_paid() {
    let h = harness().await;
    let invoice = h
        .engine
        .create(&h.base_draft(t0() + Duration::days(3)))
        .await
        .unwrap();

    let err = h.engine.mark_paid(&invoice.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::Conflict {
            current: BillingStatus::Pending,
            ..
        })
    ));
}

// =============================================================================
// Recurrence
// =============================================================================

#[tokio::test]
async fn paying_a_recurring_cycle_chains_the_next() {
    let h = harness().await;
    let until = t0() + Duration::days(365);
    let invoice = h
        .engine
        .create(&h.recurring_draft(t0(), 30, until))
        .await
        .unwrap();

    // Same-day: the first instance was dispatched, parent mirrors it.
    assert_eq!(invoice.status, BillingStatus::Unpaid);
    let first_id = invoice.active_recurrence_id.clone().unwrap();
    let first = h.db.recurrences().get_by_id(&first_id).await.unwrap().unwrap();
    assert_eq!(first.status, BillingStatus::Unpaid);
    assert_eq!(first.total_cents, 27195);

    let after = h.engine.mark_paid(&invoice.id).await.unwrap();

    // Parent is back to pending, pointing at a fresh instance.
    assert_eq!(after.status, BillingStatus::Pending);
    assert!(after.sent_at.is_none());
    let next_id = after.active_recurrence_id.clone().unwrap();
    assert_ne!(next_id, first_id);

    let paid = h.db.recurrences().get_by_id(&first_id).await.unwrap().unwrap();
    assert_eq!(paid.status, BillingStatus::Paid);

    let next = h.db.recurrences().get_by_id(&next_id).await.unwrap().unwrap();
    assert_eq!(next.status, BillingStatus::Pending);
    assert_eq!(next.invoice_date, first.invoice_date + Duration::days(30));
    assert_eq!(next.due_date, next.invoice_date + Duration::days(14));
    // Terms are copied, never recomputed.
    assert_eq!(next.total_cents, first.total_cents);
    assert_ne!(next.number, first.number);
}

#[tokio::test]
async fn recurrence_stops_when_next_cycle_passes_end_date() {
    let h = harness().await;
    // Interval 30 but the arrangement ends in 10 days: exactly one cycle.
    let until = t0() + Duration::days(10);
    let invoice = h
        .engine
        .create(&h.recurring_draft(t0(), 30, until))
        .await
        .unwrap();
    let instance_id = invoice.active_recurrence_id.clone().unwrap();

    let after = h.engine.mark_paid(&invoice.id).await.unwrap();

    assert_eq!(after.status, BillingStatus::Paid);
    let instance = h
        .db
        .recurrences()
        .get_by_id(&instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(instance.status, BillingStatus::Paid);
    // The template still points at the final instance; nothing new chained.
    assert_eq!(after.active_recurrence_id.as_deref(), Some(instance_id.as_str()));

    assert_eq!(
        h.notifier.kinds(),
        vec![NoticeKind::InvoiceIssued, NoticeKind::RecurrenceStopped]
    );
}

#[tokio::test]
async fn expired_instance_mirrors_onto_parent() {
    let h = harness().await;
    let until = t0() + Duration::days(365);
    let invoice = h
        .engine
        .create(&h.recurring_draft(t0(), 30, until))
        .await
        .unwrap();
    let instance_id = invoice.active_recurrence_id.clone().unwrap();

    let (job, _handle) = ExpiryJob::new(
        h.db.clone(),
        h.engine.clone(),
        Arc::new(h.clock.clone()),
        SchedulerConfig::default(),
    );
    h.clock.advance(Duration::days(15));
    let report = job.sweep().await.unwrap();
    assert_eq!(report.instances_expired, 1);

    let parent = h.db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
    assert_eq!(parent.status, BillingStatus::Expired);
    let instance = h
        .db
        .recurrences()
        .get_by_id(&instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(instance.status, BillingStatus::Expired);
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn price_updates_never_touch_issued_invoices() {
    let h = harness().await;
    let invoice = h.engine.create(&h.base_draft(t0())).await.unwrap();

    h.db.products()
        .update_price(&h.product_id, 99999)
        .await
        .unwrap();

    let items = h.db.invoices().items(&invoice.id).await.unwrap();
    assert_eq!(items[0].unit_price_cents, 12500);
    let unchanged = h.db.invoices().get_by_id(&invoice.id).await.unwrap().unwrap();
    assert_eq!(unchanged.total_cents, 27195);

    // But a new invoice sees the new price.
    let fresh = h
        .engine
        .create(&h.base_draft(t0() + Duration::days(3)))
        .await
        .unwrap();
    assert_eq!(fresh.subtotal_cents, 199998);
}

// =============================================================================
// Cascades and deletion
// =============================================================================

#[tokio::test]
async fn deactivating_a_client_cancels_only_open_invoices() {
    let h = harness().await;
    let open_a = h.engine.create(&h.base_draft(t0())).await.unwrap();
    let open_b = h
        .engine
        .create(&h.base_draft(t0() + Duration::days(2)))
        .await
        .unwrap();
    let paid = h.engine.create(&h.base_draft(t0())).await.unwrap();
    h.engine.mark_paid(&paid.id).await.unwrap();

    h.db.clients().deactivate(&h.client_id).await.unwrap();
    let cancelled = h.engine.cancel_open_for_client(&h.client_id).await.unwrap();
    assert_eq!(cancelled, 2);

    for id in [&open_a.id, &open_b.id] {
        let invoice = h.db.invoices().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(invoice.status, BillingStatus::Cancelled);
        assert!(invoice.cancelled_at.is_some());
    }
    let paid = h.db.invoices().get_by_id(&paid.id).await.unwrap().unwrap();
    assert_eq!(paid.status, BillingStatus::Paid);

    // The deactivated client also rejects new invoices.
    let err = h.engine.create(&h.base_draft(t0())).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn soft_delete_only_before_dispatch() {
    let h = harness().await;
    let pending = h
        .engine
        .create(&h.base_draft(t0() + Duration::days(3)))
        .await
        .unwrap();
    let sent = h.engine.create(&h.base_draft(t0())).await.unwrap();

    h.engine.soft_delete(&pending.id).await.unwrap();
    assert!(h.db.invoices().get_by_id(&pending.id).await.unwrap().is_none());

    let err = h.engine.soft_delete(&sent.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::Conflict { .. })));

    // Operating on a deleted invoice reads as NotFound.
    let err = h.engine.mark_paid(&pending.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));
}
