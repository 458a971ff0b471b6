//! # Audit Log Repository
//!
//! Append-only trail of sensitive actions: logins, checkouts, voids,
//! inventory edits. Callers treat writes as best-effort; a failed audit
//! insert is logged and swallowed so it never rolls back the action it
//! describes.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbResult;
use pharmapos_core::AuditLogEntry;

const AUDIT_COLUMNS: &str =
    "id, user_id, action_type, table_affected, record_id, details, created_at";

/// Repository for audit log entries.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    /// Creates a new AuditLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Appends an audit entry. `details` holds a serialized JSON payload
    /// describing the action.
    pub async fn log(
        &self,
        user_id: Option<&str>,
        action_type: &str,
        table_affected: &str,
        record_id: Option<&str>,
        details: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, user_id, action_type, table_affected, record_id, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(action_type)
        .bind(table_affected)
        .bind(record_id)
        .bind(details)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists the most recent audit entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Lists audit entries touching a specific record, newest first.
    pub async fn for_record(&self, table: &str, record_id: &str) -> DbResult<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs \
             WHERE table_affected = ?1 AND record_id = ?2 ORDER BY created_at DESC"
        ))
        .bind(table)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
