//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Price Snapshot Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.price_cents is the LIVE price.                               │
//! │                                                                         │
//! │  Invoice creation copies it into invoice_items.unit_price_cents and    │
//! │  never reads it back. update_price therefore changes only FUTURE       │
//! │  invoices; every issued invoice keeps the price it was created with.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use billify_core::Product;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    business_id: String,
    name: String,
    description: Option<String>,
    price_cents: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, business_id, name, description, price_cents,
           is_active, created_at, updated_at
    FROM products
"#;

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, business_id, name, description, price_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.business_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a product's live price.
    ///
    /// Issued invoices are unaffected: their line items carry a snapshot.
    pub async fn update_price(&self, id: &str, price_cents: i64) -> DbResult<()> {
        let now = Utc::now();

        debug!(id = %id, price_cents = price_cents, "Updating product price");

        let result = sqlx::query(
            r#"
            UPDATE products SET price_cents = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deactivates a product (soft delete).
    ///
    /// The caller is expected to follow up with
    /// `LifecycleEngine::cancel_open_for_product` so the cascade rule holds.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET is_active = 0, updated_at = ?2
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}
