//! # Recurring Instance Repository
//!
//! Database operations for recurring instances, including the chaining
//! transaction that advances a recurring invoice to its next cycle.
//!
//! ## Chain Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  chain(current, next):                                                  │
//! │    BEGIN                                                                │
//! │      UPDATE instance SET status='paid'  WHERE id=current AND unpaid    │
//! │      INSERT next instance (pending, copied terms)                       │
//! │      UPDATE parent SET status='pending', active_recurrence_id=next,    │
//! │                       sent_at=NULL, paid_at=NULL                        │
//! │    COMMIT                                                               │
//! │                                                                         │
//! │  Either the cycle fully advances or nothing changes. Between chains    │
//! │  exactly one non-terminal instance exists per template.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parent invoices mirror their active instance's status, so the dispatch
//! and expiry transitions here touch both tables inside one transaction.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::invoice::adjustment_from_columns;
use billify_core::{AdjustmentMode, BillingStatus, RecurringInstance};

/// Repository for recurring instance database operations.
#[derive(Debug, Clone)]
pub struct RecurrenceRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: String,
    invoice_id: String,
    number: String,
    invoice_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    status: BillingStatus,

    subtotal_cents: i64,
    discount_amount: Option<i64>,
    discount_mode: Option<AdjustmentMode>,
    shipping_cents: i64,
    tax_amount: Option<i64>,
    tax_mode: Option<AdjustmentMode>,
    total_cents: i64,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<InstanceRow> for RecurringInstance {
    fn from(row: InstanceRow) -> Self {
        RecurringInstance {
            id: row.id,
            invoice_id: row.invoice_id,
            number: row.number,
            invoice_date: row.invoice_date,
            due_date: row.due_date,
            status: row.status,
            subtotal_cents: row.subtotal_cents,
            discount: adjustment_from_columns(row.discount_amount, row.discount_mode),
            shipping_cents: row.shipping_cents,
            tax: adjustment_from_columns(row.tax_amount, row.tax_mode),
            total_cents: row.total_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sent_at: row.sent_at,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

const SELECT_INSTANCE: &str = r#"
    SELECT id, invoice_id, number, invoice_date, due_date, status,
           subtotal_cents, discount_amount, discount_mode, shipping_cents,
           tax_amount, tax_mode, total_cents,
           created_at, updated_at, sent_at, paid_at, cancelled_at
    FROM recurring_instances
"#;

/// Builds the INSERT for a recurring instance, for reuse inside the
/// invoice-creation and chain transactions.
pub(crate) fn bind_instance_insert(
    instance: &RecurringInstance,
) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO recurring_instances (
            id, invoice_id, number, invoice_date, due_date, status,
            subtotal_cents, discount_amount, discount_mode, shipping_cents,
            tax_amount, tax_mode, total_cents,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                  ?14, ?15)
        "#,
    )
    .bind(&instance.id)
    .bind(&instance.invoice_id)
    .bind(&instance.number)
    .bind(instance.invoice_date)
    .bind(instance.due_date)
    .bind(instance.status)
    .bind(instance.subtotal_cents)
    .bind(instance.discount.map(|a| a.raw_amount()))
    .bind(instance.discount.map(|a| a.mode()))
    .bind(instance.shipping_cents)
    .bind(instance.tax.map(|a| a.raw_amount()))
    .bind(instance.tax.map(|a| a.mode()))
    .bind(instance.total_cents)
    .bind(instance.created_at)
    .bind(instance.updated_at)
}

impl RecurrenceRepository {
    /// Creates a new RecurrenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecurrenceRepository { pool }
    }

    /// Gets a recurring instance by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RecurringInstance>> {
        let row: Option<InstanceRow> =
            sqlx::query_as(&format!("{SELECT_INSTANCE} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(RecurringInstance::from))
    }

    /// Inserts a recurring instance.
    pub async fn insert(&self, instance: &RecurringInstance) -> DbResult<()> {
        debug!(
            id = %instance.id,
            invoice_id = %instance.invoice_id,
            number = %instance.number,
            "Inserting recurring instance"
        );

        bind_instance_insert(instance).execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Scheduler queries
    // =========================================================================

    /// Pending instances whose invoice_date falls inside `[start, end)`,
    /// skipping instances whose parent template was soft deleted.
    pub async fn due_for_dispatch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<RecurringInstance>> {
        let rows: Vec<InstanceRow> = sqlx::query_as(&format!(
            r#"{SELECT_INSTANCE}
            WHERE status = 'pending'
              AND invoice_date >= ?1
              AND invoice_date < ?2
              AND invoice_id IN (
                  SELECT id FROM invoices WHERE deleted_at IS NULL
              )
            ORDER BY invoice_date"#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecurringInstance::from).collect())
    }

    /// Unpaid instances whose due_date is strictly before the cutoff,
    /// skipping instances whose parent template was soft deleted.
    pub async fn due_for_expiry(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Vec<RecurringInstance>> {
        let rows: Vec<InstanceRow> = sqlx::query_as(&format!(
            r#"{SELECT_INSTANCE}
            WHERE status = 'unpaid'
              AND due_date < ?1
              AND invoice_id IN (
                  SELECT id FROM invoices WHERE deleted_at IS NULL
              )
            ORDER BY due_date"#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecurringInstance::from).collect())
    }

    // =========================================================================
    // Status transitions (mirror the parent template)
    // =========================================================================

    /// Dispatches an instance: pending → unpaid on both the instance and
    /// its parent template, atomically. Returns false if the instance was
    /// not pending.
    pub async fn mark_sent(
        &self,
        instance_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE recurring_instances
            SET status = 'unpaid', sent_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(instance_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'unpaid', sent_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'pending' AND deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Expires an instance: unpaid → expired on both the instance and its
    /// parent template, atomically. Returns false if the instance was not
    /// unpaid.
    pub async fn mark_expired(
        &self,
        instance_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE recurring_instances
            SET status = 'expired', updated_at = ?2
            WHERE id = ?1 AND status = 'unpaid'
            "#,
        )
        .bind(instance_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'expired', updated_at = ?2
            WHERE id = ?1 AND status = 'unpaid' AND deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Cancels an instance: pending|unpaid → cancelled on both the instance
    /// and its parent template, atomically. Returns false if the instance
    /// was not open.
    pub async fn mark_cancelled(
        &self,
        instance_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE recurring_instances
            SET status = 'cancelled', cancelled_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'unpaid')
            "#,
        )
        .bind(instance_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'cancelled', cancelled_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'unpaid') AND deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Advances a recurring invoice to its next cycle: marks the current
    /// instance paid, inserts the next pending instance, and resets the
    /// parent template to pending pointing at it. Atomic. Returns false if
    /// the current instance was not unpaid.
    pub async fn chain(
        &self,
        current_instance_id: &str,
        next: &RecurringInstance,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(
            current = %current_instance_id,
            next = %next.id,
            invoice_id = %next.invoice_id,
            "Chaining recurring invoice"
        );

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE recurring_instances
            SET status = 'paid', paid_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'unpaid'
            "#,
        )
        .bind(current_instance_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        bind_instance_insert(next).execute(&mut *tx).await?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'pending', active_recurrence_id = ?2,
                sent_at = NULL, paid_at = NULL, updated_at = ?3
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(&next.invoice_id)
        .bind(&next.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Closes out a recurrence that has reached its end date: marks the
    /// current instance paid and the parent template paid, with no next
    /// cycle. Atomic. Returns false if the current instance was not unpaid.
    pub async fn finish(
        &self,
        current_instance_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(
            current = %current_instance_id,
            invoice_id = %invoice_id,
            "Recurrence reached its end date"
        );

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE recurring_instances
            SET status = 'paid', paid_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'unpaid'
            "#,
        )
        .bind(current_instance_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = ?2, updated_at = ?2
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
