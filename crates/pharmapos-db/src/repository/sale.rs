//! # Sale Repository
//!
//! Read-side access to completed and voided sales. Writes go through the
//! checkout engine, which owns the sale transaction; this repository only
//! answers questions about sales that already exist.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use pharmapos_core::{Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = "id, invoice_number, user_id, total_amount_cents, payment_method, \
     cash_tendered_cents, change_cents, status, notes, created_at, voided_at, voided_by";

const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, name_snapshot, unit_price_cents, \
     quantity, discount_cents, subtotal_cents, created_at";

/// Repository for sale queries.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets a sale by its invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE invoice_number = ?1"
        ))
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Lists the line items of a sale, in insertion order.
    pub async fn items_for_sale(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists sales created between two instants, newest first.
    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<Sale>> {
        debug!(from = %from, to = %to, "Listing sales in range");

        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE created_at >= ?1 AND created_at < ?2 \
             ORDER BY created_at DESC LIMIT ?3"
        ))
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists sales with a given status, newest first.
    pub async fn list_by_status(&self, status: SaleStatus, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists the most recent sales regardless of status.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Counts invoices issued on a calendar date (completed and voided
    /// alike; voiding never frees an invoice number).
    pub async fn count_for_date(&self, date: NaiveDate) -> DbResult<i64> {
        let prefix = format!("INV-{}-%", date.format("%Y%m%d"));

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE invoice_number LIKE ?1")
                .bind(prefix)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
