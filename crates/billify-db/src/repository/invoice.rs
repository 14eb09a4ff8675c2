//! # Invoice Repository
//!
//! Database operations for invoices and their line items.
//!
//! ## Transaction Boundaries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_with_items:                                                     │
//! │    BEGIN                                                                │
//! │      INSERT invoice                                                     │
//! │      INSERT item (× N, snapshotted)                                     │
//! │      INSERT first recurring instance (when recurring)                   │
//! │    COMMIT                                                               │
//! │                                                                         │
//! │  An invoice is never visible without its items, and a recurring        │
//! │  template is never visible without its first instance.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Compare-and-Set Transitions
//! Every status transition is a conditional UPDATE filtered on the expected
//! current status. `rows_affected == 0` means the record was missing, soft
//! deleted, or already moved on; the caller re-reads to tell those apart.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::recurrence::bind_instance_insert;
use billify_core::{
    Adjustment, AdjustmentMode, BillingStatus, Invoice, InvoiceItem, PaymentMethod,
    RecurrenceTerms, RecurringInstance,
};

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    business_id: String,
    client_id: String,
    number: String,
    invoice_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    payment_terms_days: i64,
    method: PaymentMethod,
    status: BillingStatus,

    subtotal_cents: i64,
    discount_amount: Option<i64>,
    discount_mode: Option<AdjustmentMode>,
    shipping_cents: i64,
    tax_amount: Option<i64>,
    tax_mode: Option<AdjustmentMode>,
    total_cents: i64,

    recurring: bool,
    recurrence_interval_days: Option<i64>,
    recurrence_until: Option<DateTime<Utc>>,
    active_recurrence_id: Option<String>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

/// Reassembles an `Option<Adjustment>` from its two stored columns.
/// The schema CHECK guarantees both are set or both are NULL.
pub(crate) fn adjustment_from_columns(
    amount: Option<i64>,
    mode: Option<AdjustmentMode>,
) -> Option<Adjustment> {
    match (amount, mode) {
        (Some(amount), Some(mode)) => Some(Adjustment::from_parts(amount, mode)),
        _ => None,
    }
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        let recurrence = match (
            row.recurring,
            row.recurrence_interval_days,
            row.recurrence_until,
        ) {
            (true, Some(interval_days), Some(until)) => Some(RecurrenceTerms {
                interval_days,
                until,
            }),
            _ => None,
        };

        Invoice {
            id: row.id,
            business_id: row.business_id,
            client_id: row.client_id,
            number: row.number,
            invoice_date: row.invoice_date,
            due_date: row.due_date,
            payment_terms_days: row.payment_terms_days,
            method: row.method,
            status: row.status,
            subtotal_cents: row.subtotal_cents,
            discount: adjustment_from_columns(row.discount_amount, row.discount_mode),
            shipping_cents: row.shipping_cents,
            tax: adjustment_from_columns(row.tax_amount, row.tax_mode),
            total_cents: row.total_cents,
            recurrence,
            active_recurrence_id: row.active_recurrence_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sent_at: row.sent_at,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    invoice_id: String,
    product_id: String,
    name_snapshot: String,
    unit_price_cents: i64,
    quantity: i64,
    line_total_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for InvoiceItem {
    fn from(row: ItemRow) -> Self {
        InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            unit_price_cents: row.unit_price_cents,
            quantity: row.quantity,
            line_total_cents: row.line_total_cents,
            created_at: row.created_at,
        }
    }
}

const SELECT_INVOICE: &str = r#"
    SELECT id, business_id, client_id, number, invoice_date, due_date,
           payment_terms_days, method, status,
           subtotal_cents, discount_amount, discount_mode, shipping_cents,
           tax_amount, tax_mode, total_cents,
           recurring, recurrence_interval_days, recurrence_until,
           active_recurrence_id,
           created_at, updated_at, sent_at, paid_at, cancelled_at, deleted_at
    FROM invoices
"#;

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice by ID. Soft-deleted invoices are not returned.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "{SELECT_INVOICE} WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Invoice::from))
    }

    /// Gets an invoice by ID including soft-deleted ones.
    ///
    /// Used after a failed compare-and-set to tell "gone" from "moved on".
    pub async fn get_by_id_any(&self, id: &str) -> DbResult<Option<Invoice>> {
        let row: Option<InvoiceRow> =
            sqlx::query_as(&format!("{SELECT_INVOICE} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Invoice::from))
    }

    /// Gets all line items for an invoice, in insertion order.
    pub async fn items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT id, invoice_id, product_id, name_snapshot,
                   unit_price_cents, quantity, line_total_cents, created_at
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceItem::from).collect())
    }

    /// Inserts an invoice with its line items, and the first recurring
    /// instance when the invoice is a recurring template, atomically.
    pub async fn insert_with_items(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
        first_instance: Option<&RecurringInstance>,
    ) -> DbResult<()> {
        debug!(
            id = %invoice.id,
            number = %invoice.number,
            items = items.len(),
            recurring = invoice.is_recurring(),
            "Inserting invoice"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, business_id, client_id, number, invoice_date, due_date,
                payment_terms_days, method, status,
                subtotal_cents, discount_amount, discount_mode, shipping_cents,
                tax_amount, tax_mode, total_cents,
                recurring, recurrence_interval_days, recurrence_until,
                active_recurrence_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                      ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.business_id)
        .bind(&invoice.client_id)
        .bind(&invoice.number)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.payment_terms_days)
        .bind(invoice.method)
        .bind(invoice.status)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount.map(|a| a.raw_amount()))
        .bind(invoice.discount.map(|a| a.mode()))
        .bind(invoice.shipping_cents)
        .bind(invoice.tax.map(|a| a.raw_amount()))
        .bind(invoice.tax.map(|a| a.mode()))
        .bind(invoice.total_cents)
        .bind(invoice.is_recurring())
        .bind(invoice.recurrence.map(|r| r.interval_days))
        .bind(invoice.recurrence.map(|r| r.until))
        .bind(&invoice.active_recurrence_id)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, product_id, name_snapshot,
                    unit_price_cents, quantity, line_total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(instance) = first_instance {
            bind_instance_insert(instance).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Compare-and-set transitions
    // =========================================================================

    /// pending → unpaid. Returns false if the invoice was not pending.
    pub async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'unpaid', sent_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'pending' AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// unpaid → paid. Returns false if the invoice was not unpaid.
    pub async fn mark_paid(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'unpaid' AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// pending|unpaid → cancelled. Returns false if the invoice was not open.
    pub async fn mark_cancelled(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'cancelled', cancelled_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'unpaid') AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// unpaid → expired. Returns false if the invoice was not unpaid.
    pub async fn mark_expired(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'expired', updated_at = ?2
            WHERE id = ?1 AND status = 'unpaid' AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes an invoice. Idempotent: false means it was already
    /// deleted or never existed.
    pub async fn soft_delete(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET deleted_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Scheduler queries
    // =========================================================================

    /// Non-recurring pending invoices whose invoice_date falls inside
    /// `[start, end)`. Recurring templates are dispatched through their
    /// instances instead.
    pub async fn due_for_dispatch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            r#"{SELECT_INVOICE}
            WHERE status = 'pending'
              AND recurring = 0
              AND deleted_at IS NULL
              AND invoice_date >= ?1
              AND invoice_date < ?2
            ORDER BY invoice_date"#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    /// Non-recurring unpaid invoices whose due_date is strictly before the
    /// cutoff.
    pub async fn due_for_expiry(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            r#"{SELECT_INVOICE}
            WHERE status = 'unpaid'
              AND recurring = 0
              AND deleted_at IS NULL
              AND due_date < ?1
            ORDER BY due_date"#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    // =========================================================================
    // Cascade queries
    // =========================================================================

    /// Open (pending or unpaid) invoices addressed to a client.
    pub async fn open_for_client(&self, client_id: &str) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            r#"{SELECT_INVOICE}
            WHERE client_id = ?1
              AND status IN ('pending', 'unpaid')
              AND deleted_at IS NULL"#
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    /// Open (pending or unpaid) invoices containing a product.
    pub async fn open_for_product(&self, product_id: &str) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            r#"{SELECT_INVOICE}
            WHERE status IN ('pending', 'unpaid')
              AND deleted_at IS NULL
              AND id IN (
                  SELECT DISTINCT invoice_id FROM invoice_items
                  WHERE product_id = ?1
              )"#
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }
}

/// Generates a client-facing invoice number: `INV-YYYYMMDD-XXXXXX`.
///
/// The suffix is drawn from a fresh UUID, so collisions are covered by the
/// UNIQUE constraint rather than coordination.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("INV-{}-{}", now.format("%Y%m%d"), suffix)
}
