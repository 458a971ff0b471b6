//! # Repository Layer
//!
//! One repository per table family, each a thin `Clone`-able handle over
//! the shared [`sqlx::SqlitePool`]. Repositories own the SQL; callers see
//! domain types from `pharmapos-core` and `DbError` on failure.

pub mod audit;
pub mod category;
pub mod product;
pub mod report;
pub mod sale;
pub mod supplier;
pub mod user;

pub use audit::AuditLogRepository;
pub use category::CategoryRepository;
pub use product::ProductRepository;
pub use report::{DailyTotal, ReportRepository, SalesSummary, TopProduct};
pub use sale::SaleRepository;
pub use supplier::SupplierRepository;
pub use user::UserRepository;
