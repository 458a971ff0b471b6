//! # Report Repository
//!
//! Aggregate queries over sale history. Voided sales are excluded from
//! revenue figures but reported separately so the day's tape still adds up.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::DbResult;
use pharmapos_core::Money;

/// Revenue and volume over a reporting window.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SalesSummary {
    /// Count of completed sales.
    pub sale_count: i64,
    /// Count of voided sales in the same window.
    pub voided_count: i64,
    /// Revenue from completed sales, in cents.
    pub total_cents: i64,
    /// Cash portion of the revenue, in cents.
    pub cash_cents: i64,
}

impl SalesSummary {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One product's aggregate sale volume.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: String,
    pub name_snapshot: String,
    pub total_quantity: i64,
    pub total_revenue_cents: i64,
}

/// Completed-sale totals for a single calendar date.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyTotal {
    pub sale_date: NaiveDate,
    pub sale_count: i64,
    pub total_cents: i64,
}

/// Repository for reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Summarizes sales between two instants.
    pub async fn sales_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<SalesSummary> {
        let summary = sqlx::query_as::<_, SalesSummary>(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'completed') AS sale_count,
                COUNT(*) FILTER (WHERE status = 'voided') AS voided_count,
                COALESCE(SUM(total_amount_cents) FILTER (WHERE status = 'completed'), 0) AS total_cents,
                COALESCE(SUM(total_amount_cents)
                    FILTER (WHERE status = 'completed' AND payment_method = 'cash'), 0) AS cash_cents
             FROM sales
             WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Best-selling products by quantity over a window.
    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<TopProduct>> {
        let rows = sqlx::query_as::<_, TopProduct>(
            "SELECT
                si.product_id,
                si.name_snapshot,
                SUM(si.quantity) AS total_quantity,
                SUM(si.subtotal_cents) AS total_revenue_cents
             FROM sale_items si
             JOIN sales s ON s.id = si.sale_id
             WHERE s.status = 'completed' AND s.created_at >= ?1 AND s.created_at < ?2
             GROUP BY si.product_id, si.name_snapshot
             ORDER BY total_quantity DESC
             LIMIT ?3",
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Per-day completed-sale totals over a window, oldest first.
    pub async fn daily_totals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<DailyTotal>> {
        let rows = sqlx::query_as::<_, DailyTotal>(
            "SELECT
                DATE(created_at) AS sale_date,
                COUNT(*) AS sale_count,
                COALESCE(SUM(total_amount_cents), 0) AS total_cents
             FROM sales
             WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2
             GROUP BY DATE(created_at)
             ORDER BY sale_date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
