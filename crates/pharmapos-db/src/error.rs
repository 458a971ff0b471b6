//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutError::Persistence / caller-facing error                      │
//! │                                                                         │
//! │  Constraint failures are classified so callers can react:              │
//! │  a duplicate invoice number triggers an allocator retry, a foreign     │
//! │  key failure on product delete becomes a deactivation offer.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pharmapos_core::ValidationError;
use thiserror::Error;

/// Database operation errors.
///
/// These wrap sqlx errors and provide additional context for debugging
/// and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate category name or username
    /// - Two concurrent checkouts racing for the same invoice number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent product_id or sale_id
    /// - Deleting a row that other rows still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A delete was refused because other records reference the row.
    ///
    /// Raised by explicit reference checks (product with sale items,
    /// category with products) before the database would reject the delete,
    /// so the caller can offer deactivation instead.
    #[error("{entity} '{id}' is referenced by {count} {referencing} and cannot be deleted")]
    ReferencedElsewhere {
        entity: String,
        id: String,
        referencing: String,
        count: i64,
    },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Input failed business-rule validation before reaching the database.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The database was busy or locked by another writer (SQLITE_BUSY /
    /// SQLITE_LOCKED). Transient; safe to retry.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use, acquire timed out).
    /// Fails fast and is safe to retry.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether this error is a unique-constraint failure on the given column
    /// (e.g. `sales.invoice_number`). Used by the checkout engine to decide
    /// whether to retry invoice allocation.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }

    /// Whether this error is a transient busy/locked condition that a
    /// fresh transaction can be expected to get past.
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>"
                // FK:     "FOREIGN KEY constraint failed"
                // BUSY:   "database is locked" / "database table is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_matcher() {
        let err = DbError::UniqueViolation {
            field: "sales.invoice_number".to_string(),
            value: "unknown".to_string(),
        };
        assert!(err.is_unique_violation_on("invoice_number"));
        assert!(!err.is_unique_violation_on("username"));

        let other = DbError::PoolExhausted;
        assert!(!other.is_unique_violation_on("invoice_number"));
    }

    #[test]
    fn test_busy_matcher() {
        let busy = DbError::Busy("database is locked".to_string());
        assert!(busy.is_busy());
        assert!(!busy.is_unique_violation_on("invoice_number"));

        let query = DbError::QueryFailed("no such table: x".to_string());
        assert!(!query.is_busy());
    }
}
