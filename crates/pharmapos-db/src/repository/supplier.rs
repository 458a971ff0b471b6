//! # Supplier Repository
//!
//! Database operations for pharmacy suppliers.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharmapos_core::Supplier;

const SUPPLIER_COLUMNS: &str = "id, name, contact_person, phone, email, address, created_at";

/// Repository for supplier database operations.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Gets a supplier by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }

    /// Lists all suppliers sorted by name.
    pub async fn list_all(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(suppliers)
    }

    /// Inserts a new supplier.
    pub async fn insert(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            "INSERT INTO suppliers (id, name, contact_person, phone, email, address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing supplier.
    pub async fn update(&self, supplier: &Supplier) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE suppliers SET
                name = ?2, contact_person = ?3, phone = ?4, email = ?5, address = ?6
             WHERE id = ?1",
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", &supplier.id));
        }

        Ok(())
    }

    /// Deletes a supplier. Refused while products still reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE supplier_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if references > 0 {
            return Err(DbError::ReferencedElsewhere {
                entity: "Supplier".to_string(),
                id: id.to_string(),
                referencing: "products".to_string(),
                count: references,
            });
        }

        let result = sqlx::query("DELETE FROM suppliers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }

        Ok(())
    }
}
