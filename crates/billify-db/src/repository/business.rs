//! # Business Repository
//!
//! Database operations for registered businesses. Registration itself lives
//! in the excluded outer layer; the core needs existence checks and the
//! identity block rendered into invoice emails.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use billify_core::Business;

/// Repository for business database operations.
#[derive(Debug, Clone)]
pub struct BusinessRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct BusinessRow {
    id: String,
    name: String,
    email: String,
    address: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Business {
            id: row.id,
            name: row.name,
            email: row.email,
            address: row.address,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl BusinessRepository {
    /// Creates a new BusinessRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BusinessRepository { pool }
    }

    /// Gets a business by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Business>> {
        let row: Option<BusinessRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, address, phone, created_at, updated_at
            FROM businesses
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Business::from))
    }

    /// Inserts a business.
    pub async fn insert(&self, business: &Business) -> DbResult<()> {
        debug!(id = %business.id, name = %business.name, "Inserting business");

        sqlx::query(
            r#"
            INSERT INTO businesses (id, name, email, address, phone, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&business.id)
        .bind(&business.name)
        .bind(&business.email)
        .bind(&business.address)
        .bind(&business.phone)
        .bind(business.created_at)
        .bind(business.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
