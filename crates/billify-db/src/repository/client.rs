//! # Client Repository
//!
//! Database operations for clients.
//!
//! Deactivating a client is the upstream trigger for cascade cancellation:
//! the caller deactivates here, then asks the lifecycle engine to cancel
//! every open invoice referencing the client.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use billify_core::{Client, PaymentMethod};

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: String,
    business_id: String,
    name: String,
    email: String,
    address: Option<String>,
    phone: Option<String>,
    preferred_method: PaymentMethod,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            email: row.email,
            address: row.address,
            phone: row.phone,
            preferred_method: row.preferred_method,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_CLIENT: &str = r#"
    SELECT id, business_id, name, email, address, phone,
           preferred_method, is_active, created_at, updated_at
    FROM clients
"#;

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Gets a client by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Client>> {
        let row: Option<ClientRow> =
            sqlx::query_as(&format!("{SELECT_CLIENT} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Client::from))
    }

    /// Inserts a client.
    pub async fn insert(&self, client: &Client) -> DbResult<()> {
        debug!(id = %client.id, business_id = %client.business_id, "Inserting client");

        sqlx::query(
            r#"
            INSERT INTO clients (
                id, business_id, name, email, address, phone,
                preferred_method, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&client.id)
        .bind(&client.business_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.address)
        .bind(&client.phone)
        .bind(client.preferred_method)
        .bind(client.is_active)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deactivates a client (soft delete).
    ///
    /// The caller is expected to follow up with
    /// `LifecycleEngine::cancel_open_for_client` so the cascade rule holds.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE clients SET is_active = 0, updated_at = ?2
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }

        Ok(())
    }
}
