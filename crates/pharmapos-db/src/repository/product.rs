//! # Product Repository
//!
//! Database operations for pharmacy products.
//!
//! ## Delete Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Product Delete Flow                                  │
//! │                                                                         │
//! │  delete(product_id)                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Any sale_items referencing this product?                              │
//! │       │                                                                 │
//! │       ├── YES → Err(ReferencedElsewhere) — sale history must keep      │
//! │       │         its product references. Caller offers deactivate()     │
//! │       │         instead, which hides the product from sale but         │
//! │       │         preserves reports.                                     │
//! │       │                                                                 │
//! │       └── NO  → hard DELETE                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmapos_core::validation::{
    validate_price_cents, validate_product_name, validate_reorder_level,
};
use pharmapos_core::Product;

/// Columns selected for every Product read, kept in one place so the
/// queries and the FromRow derive can't drift apart.
const PRODUCT_COLUMNS: &str = "id, name, category_id, description, unit_price_cents, \
     cost_price_cents, stock_quantity, reorder_level, expiry_date, supplier_id, \
     is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Searches active products by name (case-insensitive substring match).
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{}%", query);

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND name LIKE ?1 \
             ORDER BY name LIMIT ?2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product after validating its fields.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        validate_fields(product)?;

        sqlx::query(
            "INSERT INTO products (
                id, name, category_id, description,
                unit_price_cents, cost_price_cents,
                stock_quantity, reorder_level, expiry_date, supplier_id,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(product.expiry_date)
        .bind(&product.supplier_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product after validating its fields.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        validate_fields(product)?;

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET
                name = ?2,
                category_id = ?3,
                description = ?4,
                unit_price_cents = ?5,
                cost_price_cents = ?6,
                stock_quantity = ?7,
                reorder_level = ?8,
                expiry_date = ?9,
                supplier_id = ?10,
                is_active = ?11,
                updated_at = ?12
            WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(product.expiry_date)
        .bind(&product.supplier_id)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Adjusts product stock by a delta (negative for sales, positive for
    /// restocking or void restoration).
    ///
    /// This is the unconditional variant used by inventory management; the
    /// checkout engine uses its own guarded decrement inside the sale
    /// transaction.
    pub async fn update_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products
             SET stock_quantity = stock_quantity + ?2, updated_at = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(delta)
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
    /// The product stops appearing in sale screens but remains referenced
    /// by historical sale items and reports.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Hard-deletes a product.
    ///
    /// Refused with `ReferencedElsewhere` if any sale items reference the
    /// product; the row (including its active flag) is left untouched and
    /// the caller may offer `deactivate` instead.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_items WHERE product_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if references > 0 {
            return Err(DbError::ReferencedElsewhere {
                entity: "Product".to_string(),
                id: id.to_string(),
                referencing: "sale items".to_string(),
                count: references,
            });
        }

        debug!(id = %id, "Hard-deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Active products at or below their reorder level, most urgent first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock_quantity <= reorder_level \
             ORDER BY (reorder_level - stock_quantity) DESC, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Active products expiring within the given number of days.
    pub async fn expiring(&self, days: i64) -> DbResult<Vec<Product>> {
        let cutoff = Utc::now().date_naive() + chrono::Duration::days(days);

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND expiry_date IS NOT NULL AND expiry_date <= ?1 \
             ORDER BY expiry_date, name"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts active products (for diagnostics and seed checks).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Field checks shared by insert and update.
fn validate_fields(product: &Product) -> DbResult<()> {
    validate_product_name(&product.name)?;
    validate_price_cents(product.unit_price_cents)?;
    validate_price_cents(product.cost_price_cents)?;
    validate_reorder_level(product.reorder_level)?;
    Ok(())
}
