//! # Invoice Lifecycle Engine
//!
//! Every status mutation in the system goes through this module. Callers
//! never write status fields; they ask the engine for a transition and the
//! engine either commits it or explains the refusal.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► pending ──dispatch──► unpaid ──mark_paid──► paid          │
//! │                 │                    │  │                  │            │
//! │                 │cancel        cancel│  │due date          │recurring?  │
//! │                 ▼                    ▼  ▼                  ▼            │
//! │             cancelled        cancelled  expired       chain next cycle  │
//! │                                                       (instance+parent  │
//! │                                                        back to pending) │
//! │                                                                         │
//! │   paid / cancelled / expired are terminal. Illegal transitions are     │
//! │   rejected with Conflict carrying the current status.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Discipline
//! Transitions are compare-and-set UPDATEs in billify-db. When a CAS finds
//! zero rows the engine re-reads the record once to decide whether that was
//! NotFound (gone or soft deleted) or Conflict (already moved on). Two
//! racing mark_paid calls therefore yield exactly one success and one
//! Conflict, never a double payment.
//!
//! ## Notification Ordering
//! The transition commits first, then the notice goes out. A delivery
//! failure is logged with the invoice number and swallowed; committed
//! state is never rolled back for an observability problem.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use billify_core::validation::validate_draft;
use billify_core::{
    clamp_nominal_discount, compute_totals, BillingStatus, CoreError, Invoice, InvoiceDraft,
    InvoiceItem, LineCharge, Money, RecurringInstance,
};
use billify_db::{generate_id, generate_invoice_number, Database};

use crate::clock::{day_bounds, Clock};
use crate::error::{EngineError, EngineResult};
use crate::notify::{InvoiceNotice, NoticeKind, NoticeLine, Notifier};

/// The lifecycle engine: validation, snapshotting, transitions, chaining.
///
/// Cheap to clone; holds shared handles only.
#[derive(Clone)]
pub struct LifecycleEngine {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    /// Business timezone offset from UTC in minutes. Decides what "dated
    /// today" means for immediate dispatch on create.
    utc_offset_minutes: i32,
}

impl LifecycleEngine {
    /// Creates a new engine.
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        utc_offset_minutes: i32,
    ) -> Self {
        LifecycleEngine {
            db,
            notifier,
            clock,
            utc_offset_minutes,
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an invoice from a draft.
    ///
    /// ## Pipeline
    /// 1. Check the client and every product: exists, same business, active
    ///    (and snapshot each product's name and price into a line item)
    /// 2. Validate the draft (field rules, pair coupling)
    /// 3. Clamp a nominal discount to the subtotal, compute the totals
    /// 4. Persist invoice + items (+ first instance when recurring) atomically
    /// 5. If dated today (business-local), dispatch immediately
    ///
    /// Entity checks come first: a draft referencing a missing client fails
    /// with `NotFound` even when its fields would not validate either.
    pub async fn create(&self, draft: &InvoiceDraft) -> EngineResult<Invoice> {
        let now = self.clock.now();

        let client = self
            .db
            .clients()
            .get_by_id(&draft.client_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Client", &draft.client_id))?;
        if client.business_id != draft.business_id {
            return Err(CoreError::forbidden("Client", &draft.client_id).into());
        }
        if !client.is_active {
            return Err(CoreError::not_found("Client", &draft.client_id).into());
        }

        // Snapshot pass: freeze each product's name and price into the item.
        let invoice_id = generate_id();
        let mut items = Vec::with_capacity(draft.line_items.len());
        let mut lines = Vec::with_capacity(draft.line_items.len());

        for line in &draft.line_items {
            let product = self
                .db
                .products()
                .get_by_id(&line.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Product", &line.product_id))?;
            if product.business_id != draft.business_id {
                return Err(CoreError::forbidden("Product", &line.product_id).into());
            }
            if !product.is_active {
                return Err(CoreError::not_found("Product", &line.product_id).into());
            }

            let charge = LineCharge {
                unit_price: product.price(),
                quantity: line.quantity,
            };
            lines.push(charge);
            items.push(InvoiceItem {
                id: generate_id(),
                invoice_id: invoice_id.clone(),
                product_id: product.id,
                name_snapshot: product.name,
                unit_price_cents: product.price_cents,
                quantity: line.quantity,
                line_total_cents: charge.line_total().cents(),
                created_at: now,
            });
        }

        let terms = validate_draft(draft).map_err(CoreError::from)?;

        let subtotal = billify_core::terms::subtotal(&lines);
        let discount = terms
            .discount
            .map(|d| clamp_nominal_discount(d, subtotal));
        let breakdown = compute_totals(
            &lines,
            discount.as_ref(),
            Money::from_cents(terms.shipping_cents),
            terms.tax.as_ref(),
        );

        let due_date = draft.invoice_date + Duration::days(draft.payment_terms_days);

        let first_instance = terms.recurrence.map(|_| RecurringInstance {
            id: generate_id(),
            invoice_id: invoice_id.clone(),
            number: generate_invoice_number(now),
            invoice_date: draft.invoice_date,
            due_date,
            status: Default::default(),
            subtotal_cents: breakdown.subtotal.cents(),
            discount,
            shipping_cents: terms.shipping_cents,
            tax: terms.tax,
            total_cents: breakdown.total.cents(),
            created_at: now,
            updated_at: now,
            sent_at: None,
            paid_at: None,
            cancelled_at: None,
        });

        let invoice = Invoice {
            id: invoice_id,
            business_id: draft.business_id.clone(),
            client_id: draft.client_id.clone(),
            number: generate_invoice_number(now),
            invoice_date: draft.invoice_date,
            due_date,
            payment_terms_days: draft.payment_terms_days,
            method: draft.method,
            status: Default::default(),
            subtotal_cents: breakdown.subtotal.cents(),
            discount,
            shipping_cents: terms.shipping_cents,
            tax: terms.tax,
            total_cents: breakdown.total.cents(),
            recurrence: terms.recurrence,
            active_recurrence_id: first_instance.as_ref().map(|i| i.id.clone()),
            created_at: now,
            updated_at: now,
            sent_at: None,
            paid_at: None,
            cancelled_at: None,
            deleted_at: None,
        };

        self.db
            .invoices()
            .insert_with_items(&invoice, &items, first_instance.as_ref())
            .await?;

        info!(
            id = %invoice.id,
            number = %invoice.number,
            total_cents = invoice.total_cents,
            recurring = invoice.is_recurring(),
            "Invoice created"
        );

        // Same-day invoices do not wait for the next sweep.
        let (day_start, day_end) = day_bounds(now, self.utc_offset_minutes);
        if invoice.invoice_date >= day_start && invoice.invoice_date < day_end {
            match &first_instance {
                Some(instance) => {
                    self.dispatch_instance(instance).await?;
                }
                None => {
                    self.dispatch_invoice(&invoice).await?;
                }
            }
            // Pick up the post-dispatch status and timestamps.
            if let Some(updated) = self.db.invoices().get_by_id(&invoice.id).await? {
                return Ok(updated);
            }
        }

        Ok(invoice)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches a non-recurring invoice: pending → unpaid, then notifies.
    ///
    /// Returns false when the invoice was no longer pending; sweeps treat
    /// that as an idempotent no-op rather than an error.
    pub async fn dispatch_invoice(&self, invoice: &Invoice) -> EngineResult<bool> {
        let now = self.clock.now();
        if !self.db.invoices().mark_sent(&invoice.id, now).await? {
            debug!(id = %invoice.id, "Dispatch skipped, invoice no longer pending");
            return Ok(false);
        }

        info!(id = %invoice.id, number = %invoice.number, "Invoice dispatched");
        self.notify(
            NoticeKind::InvoiceIssued,
            invoice,
            &invoice.number,
            BillingStatus::Unpaid,
            invoice.due_date,
            None,
        )
        .await;
        Ok(true)
    }

    /// Dispatches a recurring instance: pending → unpaid on the instance
    /// and its parent template, then notifies.
    pub async fn dispatch_instance(&self, instance: &RecurringInstance) -> EngineResult<bool> {
        let now = self.clock.now();
        if !self
            .db
            .recurrences()
            .mark_sent(&instance.id, &instance.invoice_id, now)
            .await?
        {
            debug!(id = %instance.id, "Dispatch skipped, instance no longer pending");
            return Ok(false);
        }

        info!(
            id = %instance.id,
            number = %instance.number,
            invoice_id = %instance.invoice_id,
            "Recurring instance dispatched"
        );

        if let Some(parent) = self.db.invoices().get_by_id(&instance.invoice_id).await? {
            self.notify(
                NoticeKind::InvoiceIssued,
                &parent,
                &instance.number,
                BillingStatus::Unpaid,
                instance.due_date,
                None,
            )
            .await;
        }
        Ok(true)
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Records payment of an invoice.
    ///
    /// Non-recurring: unpaid → paid, terminal.
    ///
    /// Recurring: the active instance is paid, and either the next cycle is
    /// chained (instance + parent back to pending) or, when the next cycle
    /// would start after the recurrence end date, the whole arrangement is
    /// closed out and a RecurrenceStopped notice goes to the business.
    pub async fn mark_paid(&self, invoice_id: &str) -> EngineResult<Invoice> {
        let now = self.clock.now();
        let invoice = self.require_invoice(invoice_id).await?;

        let Some(recurrence) = invoice.recurrence else {
            if !self.db.invoices().mark_paid(invoice_id, now).await? {
                return Err(self.transition_conflict(invoice_id, "mark paid").await?);
            }
            info!(id = %invoice_id, number = %invoice.number, "Invoice paid");
            return self.require_invoice(invoice_id).await;
        };

        let instance_id = invoice
            .active_recurrence_id
            .clone()
            .ok_or_else(|| CoreError::not_found("RecurringInstance", invoice_id))?;
        let instance = self
            .db
            .recurrences()
            .get_by_id(&instance_id)
            .await?
            .ok_or_else(|| CoreError::not_found("RecurringInstance", &instance_id))?;

        let next_date = instance.invoice_date + Duration::days(recurrence.interval_days);

        if next_date > recurrence.until {
            // No cycle may start past the end date: close the arrangement.
            if !self
                .db
                .recurrences()
                .finish(&instance.id, invoice_id, now)
                .await?
            {
                return Err(self.transition_conflict(invoice_id, "mark paid").await?);
            }
            info!(
                id = %invoice_id,
                number = %invoice.number,
                "Recurring invoice paid, recurrence reached its end"
            );
            self.notify(
                NoticeKind::RecurrenceStopped,
                &invoice,
                &instance.number,
                BillingStatus::Paid,
                instance.due_date,
                None,
            )
            .await;
        } else {
            let next = RecurringInstance {
                id: generate_id(),
                invoice_id: invoice.id.clone(),
                number: generate_invoice_number(now),
                invoice_date: next_date,
                due_date: next_date + Duration::days(invoice.payment_terms_days),
                status: Default::default(),
                subtotal_cents: instance.subtotal_cents,
                discount: instance.discount,
                shipping_cents: instance.shipping_cents,
                tax: instance.tax,
                total_cents: instance.total_cents,
                created_at: now,
                updated_at: now,
                sent_at: None,
                paid_at: None,
                cancelled_at: None,
            };

            if !self.db.recurrences().chain(&instance.id, &next, now).await? {
                return Err(self.transition_conflict(invoice_id, "mark paid").await?);
            }
            info!(
                id = %invoice_id,
                paid_instance = %instance.id,
                next_instance = %next.id,
                next_date = %next.invoice_date,
                "Recurring cycle paid, next cycle chained"
            );
        }

        self.require_invoice(invoice_id).await
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels an open invoice (pending or unpaid). Terminal.
    ///
    /// `reason` goes into the cancellation notice; cascades pass what
    /// triggered them, user cancellations pass their own wording.
    pub async fn cancel(&self, invoice_id: &str, reason: &str) -> EngineResult<Invoice> {
        let now = self.clock.now();
        let invoice = self.require_invoice(invoice_id).await?;

        let cancelled = match &invoice.active_recurrence_id {
            Some(instance_id) => {
                self.db
                    .recurrences()
                    .mark_cancelled(instance_id, invoice_id, now)
                    .await?
            }
            None => self.db.invoices().mark_cancelled(invoice_id, now).await?,
        };

        if !cancelled {
            return Err(self.transition_conflict(invoice_id, "cancel").await?);
        }

        info!(id = %invoice_id, number = %invoice.number, reason, "Invoice cancelled");
        self.notify(
            NoticeKind::InvoiceCancelled,
            &invoice,
            &invoice.number,
            BillingStatus::Cancelled,
            invoice.due_date,
            Some(reason),
        )
        .await;
        self.require_invoice(invoice_id).await
    }

    /// Cancels every open invoice addressed to a client. Returns how many
    /// were cancelled. Used when a client is deactivated.
    pub async fn cancel_open_for_client(&self, client_id: &str) -> EngineResult<usize> {
        let open = self.db.invoices().open_for_client(client_id).await?;
        let mut cancelled = 0;
        for invoice in open {
            // Races with payment are fine: the CAS simply skips.
            match self.cancel(&invoice.id, "client account closed").await {
                Ok(_) => cancelled += 1,
                Err(EngineError::Core(CoreError::Conflict { .. })) => {}
                Err(e) => return Err(e),
            }
        }
        info!(client_id = %client_id, cancelled, "Cancelled open invoices for client");
        Ok(cancelled)
    }

    /// Cancels every open invoice containing a product. Returns how many
    /// were cancelled. Used when a product is deactivated.
    pub async fn cancel_open_for_product(&self, product_id: &str) -> EngineResult<usize> {
        let open = self.db.invoices().open_for_product(product_id).await?;
        let mut cancelled = 0;
        for invoice in open {
            match self.cancel(&invoice.id, "product no longer offered").await {
                Ok(_) => cancelled += 1,
                Err(EngineError::Core(CoreError::Conflict { .. })) => {}
                Err(e) => return Err(e),
            }
        }
        info!(product_id = %product_id, cancelled, "Cancelled open invoices for product");
        Ok(cancelled)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Soft-deletes a pending, non-recurring invoice.
    ///
    /// Narrower than cancel: anything that has reached a client (or has a
    /// cycle history) stays visible forever and must be cancelled instead.
    pub async fn soft_delete(&self, invoice_id: &str) -> EngineResult<()> {
        let now = self.clock.now();
        let invoice = self.require_invoice(invoice_id).await?;

        if invoice.sent_at.is_some()
            || invoice.is_recurring()
            || !matches!(invoice.status, billify_core::BillingStatus::Pending)
        {
            return Err(CoreError::conflict(
                "Invoice",
                invoice_id,
                invoice.status,
                "delete",
            )
            .into());
        }

        if !self.db.invoices().soft_delete(invoice_id, now).await? {
            return Err(self.transition_conflict(invoice_id, "delete").await?);
        }

        info!(id = %invoice_id, number = %invoice.number, "Invoice soft deleted");
        Ok(())
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Expires an overdue non-recurring invoice: unpaid → expired, notifies.
    pub async fn expire_invoice(&self, invoice: &Invoice) -> EngineResult<bool> {
        let now = self.clock.now();
        if !self.db.invoices().mark_expired(&invoice.id, now).await? {
            debug!(id = %invoice.id, "Expiry skipped, invoice no longer unpaid");
            return Ok(false);
        }

        info!(id = %invoice.id, number = %invoice.number, "Invoice expired");
        self.notify(
            NoticeKind::InvoiceExpired,
            invoice,
            &invoice.number,
            BillingStatus::Expired,
            invoice.due_date,
            None,
        )
        .await;
        Ok(true)
    }

    /// Expires an overdue recurring instance and its parent template.
    pub async fn expire_instance(&self, instance: &RecurringInstance) -> EngineResult<bool> {
        let now = self.clock.now();
        if !self
            .db
            .recurrences()
            .mark_expired(&instance.id, &instance.invoice_id, now)
            .await?
        {
            debug!(id = %instance.id, "Expiry skipped, instance no longer unpaid");
            return Ok(false);
        }

        info!(
            id = %instance.id,
            number = %instance.number,
            invoice_id = %instance.invoice_id,
            "Recurring instance expired"
        );

        if let Some(parent) = self.db.invoices().get_by_id(&instance.invoice_id).await? {
            self.notify(
                NoticeKind::InvoiceExpired,
                &parent,
                &instance.number,
                BillingStatus::Expired,
                instance.due_date,
                None,
            )
            .await;
        }
        Ok(true)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Loads a live invoice or fails with NotFound.
    async fn require_invoice(&self, invoice_id: &str) -> EngineResult<Invoice> {
        self.db
            .invoices()
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id).into())
    }

    /// Resolves a failed compare-and-set into the right refusal: NotFound
    /// when the record is gone or soft deleted, Conflict with the current
    /// status otherwise.
    async fn transition_conflict(
        &self,
        invoice_id: &str,
        operation: &str,
    ) -> EngineResult<EngineError> {
        let current = self.db.invoices().get_by_id_any(invoice_id).await?;
        Ok(match current {
            Some(invoice) if invoice.deleted_at.is_none() => {
                CoreError::conflict("Invoice", invoice_id, invoice.status, operation).into()
            }
            _ => CoreError::not_found("Invoice", invoice_id).into(),
        })
    }

    /// Builds and sends a notice with the full line breakdown. `status` is
    /// the post-transition status, since `invoice` may predate the commit.
    /// Delivery failures are logged, never propagated: the transition
    /// already committed.
    async fn notify(
        &self,
        kind: NoticeKind,
        invoice: &Invoice,
        number: &str,
        status: BillingStatus,
        due_date: DateTime<Utc>,
        reason: Option<&str>,
    ) {
        let (business, client, items) = match (
            self.db.businesses().get_by_id(&invoice.business_id).await,
            self.db.clients().get_by_id(&invoice.client_id).await,
            self.db.invoices().items(&invoice.id).await,
        ) {
            (Ok(Some(b)), Ok(Some(c)), Ok(items)) => (b, c, items),
            _ => {
                warn!(number = %number, ?kind, "Notice skipped, notice data unavailable");
                return;
            }
        };

        let notice = InvoiceNotice {
            invoice_id: invoice.id.clone(),
            number: number.to_string(),
            business_name: business.name,
            client_name: client.name,
            client_email: client.email,
            status,
            method: invoice.method,
            lines: items
                .into_iter()
                .map(|item| NoticeLine {
                    name: item.name_snapshot,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    line_total_cents: item.line_total_cents,
                })
                .collect(),
            total_cents: invoice.total_cents,
            due_date,
            reason: reason.map(str::to_string),
        };

        if let Err(e) = self.notifier.send(kind, &notice) {
            warn!(number = %number, ?kind, error = %e, "Notice delivery failed");
        }
    }
}
