//! # pharmapos-db: Database Layer for PharmaPOS
//!
//! This crate provides database access for the PharmaPOS pharmacy
//! point-of-sale system. It uses SQLite for local storage with sqlx for
//! async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PharmaPOS Data Flow                                │
//! │                                                                         │
//! │  POS front end (cart, sale screen, reports)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   pharmapos-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │   Services    │  │   │
//! │  │   │   (pool.rs)   │   │ (repository/)  │   │               │  │   │
//! │  │   │               │   │                │   │ CheckoutEngine│  │   │
//! │  │   │ SqlitePool    │◄──│ ProductRepo    │   │ AuthService   │  │   │
//! │  │   │ WAL, FKs on   │   │ SaleRepo       │   │               │  │   │
//! │  │   │ Migrations    │   │ UserRepo ...   │   │               │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │                     pharmacy_pos.db (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, sale, user, ...)
//! - [`checkout`] - The sale transaction: invoice allocation, stock
//!   decrement, void/compensation
//! - [`auth`] - Login and password hashing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharmapos_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("pharmacy_pos.db")).await?;
//!
//! let cashier = db.auth().login("maria", "secret").await?;
//! let receipt = db
//!     .checkout()
//!     .checkout(&cart, &cashier, PaymentMethod::Cash, Some(tendered), None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthError, AuthService};
pub use checkout::{CheckoutEngine, CheckoutError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    AuditLogRepository, CategoryRepository, ProductRepository, ReportRepository, SaleRepository,
    SupplierRepository, UserRepository,
};
