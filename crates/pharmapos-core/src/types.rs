//! # Domain Types
//!
//! Core domain types used throughout PharmaPOS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │     User        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  invoice_number │   │  username       │       │
//! │  │  unit_price     │   │  status         │   │  role           │       │
//! │  │  stock_quantity │   │  total_amount   │   │  password_hash  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SaleStatus    │   │ PaymentMethod   │   │     Role        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Completed      │   │  Cash           │   │  Admin          │       │
//! │  │  Voided         │   │  CreditCard     │   │  Pharmacist     │       │
//! │  │  (terminal)     │   │  DebitCard      │   │  Cashier        │       │
//! │  │                 │   │  MobilePayment  │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Sales carry two identifiers:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `invoice_number`: human-readable, date-scoped sequential (INV-YYYYMMDD-NNNN)

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
///
/// Cash is the only method that carries tendered/change amounts.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment (tendered/change tracked).
    Cash,
    /// Credit card on external terminal.
    CreditCard,
    /// Debit card on external terminal.
    DebitCard,
    /// GCash, Maya and similar wallets.
    MobilePayment,
}

impl PaymentMethod {
    /// Returns whether this method requires a tendered amount.
    #[inline]
    pub const fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    /// Stable string form, matching the stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::MobilePayment => "mobile_payment",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// The only legal transition is Completed → Voided; voided sales are
/// terminal and never re-activated. Sales are never hard-deleted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and committed.
    Completed,
    /// Sale was reversed; stock has been restored.
    Voided,
}

impl SaleStatus {
    /// Stable string form, matching the stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Roles & Permissions
// =============================================================================

/// User role, gating which operations are permitted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Pharmacist,
    Cashier,
}

/// A named capability checked before privileged operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Run checkouts.
    Sell,
    /// Void a completed sale (returns stock to inventory).
    VoidSale,
    /// Create/update/deactivate products, categories, suppliers.
    ManageInventory,
    /// Create and manage user accounts.
    ManageUsers,
    /// Read sales/inventory reports.
    ViewReports,
}

impl Role {
    /// Checks whether this role carries a permission.
    ///
    /// ## Permission Matrix
    /// ```text
    /// ┌──────────────────┬───────┬────────────┬─────────┐
    /// │                  │ Admin │ Pharmacist │ Cashier │
    /// ├──────────────────┼───────┼────────────┼─────────┤
    /// │ Sell             │   ✓   │     ✓      │    ✓    │
    /// │ VoidSale         │   ✓   │     ✓      │         │
    /// │ ManageInventory  │   ✓   │     ✓      │         │
    /// │ ManageUsers      │   ✓   │            │         │
    /// │ ViewReports      │   ✓   │     ✓      │         │
    /// └──────────────────┴───────┴────────────┴─────────┘
    /// ```
    pub const fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::Sell => true,
            Permission::VoidSale | Permission::ManageInventory | Permission::ViewReports => {
                matches!(self, Role::Admin | Role::Pharmacist)
            }
            Permission::ManageUsers => matches!(self, Role::Admin),
        }
    }

    /// Stable string form, matching the stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Pharmacist => "pharmacist",
            Role::Cashier => "cashier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Category this product belongs to, if any.
    pub category_id: Option<String>,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Selling price in cents.
    pub unit_price_cents: i64,

    /// Cost price in cents (for margin reporting).
    pub cost_price_cents: i64,

    /// Current stock level. Never driven below zero by a committed checkout.
    pub stock_quantity: i64,

    /// Restock threshold for low-stock reporting.
    pub reorder_level: i64,

    /// Expiry date for perishable stock, if tracked.
    pub expiry_date: Option<NaiveDate>,

    /// Supplier this product is sourced from, if any.
    pub supplier_id: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Checks if the requested quantity is available in stock.
    ///
    /// Advisory only: the checkout engine re-checks inside its transaction,
    /// since stock may be depleted concurrently after this read.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock_quantity >= quantity
    }

    /// Checks if stock has fallen to or below the reorder level.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

// =============================================================================
// Category & Supplier
// =============================================================================

/// A product category (e.g. Antibiotics, First Aid).
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    /// Unique display name.
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A supplier products are sourced from.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Created atomically with its items by the checkout engine; the only
/// mutation afterwards is the void transition.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    /// Human-readable, date-scoped sequential identifier (INV-YYYYMMDD-NNNN).
    pub invoice_number: String,
    /// Cashier who rang up the sale.
    pub user_id: String,
    /// Sum of item subtotals, in cents.
    pub total_amount_cents: i64,
    pub payment_method: PaymentMethod,
    /// Cash only: amount the customer handed over.
    pub cash_tendered_cents: Option<i64>,
    /// Tendered minus total for cash; 0 for every other method. Never
    /// negative on a completed sale.
    pub change_cents: i64,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the sale is voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// User who voided the sale.
    pub voided_by: Option<String>,
}

impl Sale {
    /// Returns the total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen, immune to later
    /// catalog price changes).
    pub unit_price_cents: i64,
    /// Quantity sold, always > 0.
    pub quantity: i64,
    /// Discount applied to this line, in cents.
    pub discount_cents: i64,
    /// quantity × unit_price − discount.
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line subtotal as Money.
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// User
// =============================================================================

/// A user account.
///
/// `password_hash` is an argon2 PHC string; the plaintext never leaves
/// the login call.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated-user record handed out after a successful login.
/// Deliberately excludes the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl SessionUser {
    /// Checks whether this session carries a permission.
    #[inline]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// An append-only record of a state-changing action.
/// Never updated or deleted by the application.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    /// Acting user; None for system actions.
    pub user_id: Option<String>,
    /// Free-form tag: sale / void / login / insert / update / delete / ...
    pub action_type: String,
    pub table_affected: String,
    pub record_id: Option<String>,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Receipt
// =============================================================================

/// One printed line on a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// Receipt-ready result of a successful checkout.
///
/// Consumed by the presentation/printing layer; carries everything needed
/// to render a receipt without further database reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub sale_id: String,
    pub invoice_number: String,
    /// Ordered line items, in cart order.
    pub lines: Vec<ReceiptLine>,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    /// Cash only.
    pub cash_tendered_cents: Option<i64>,
    /// Tendered − total for cash; 0 otherwise.
    pub change_cents: i64,
    pub cashier_name: String,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_matrix() {
        assert!(Role::Admin.has_permission(Permission::VoidSale));
        assert!(Role::Pharmacist.has_permission(Permission::VoidSale));
        assert!(!Role::Cashier.has_permission(Permission::VoidSale));

        assert!(Role::Cashier.has_permission(Permission::Sell));
        assert!(!Role::Pharmacist.has_permission(Permission::ManageUsers));
        assert!(Role::Admin.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_payment_method_is_cash() {
        assert!(PaymentMethod::Cash.is_cash());
        assert!(!PaymentMethod::CreditCard.is_cash());
        assert!(!PaymentMethod::MobilePayment.is_cash());
    }

    #[test]
    fn test_product_can_sell() {
        let product = Product {
            id: "p1".to_string(),
            name: "Paracetamol 500mg".to_string(),
            category_id: None,
            description: None,
            unit_price_cents: 500,
            cost_price_cents: 300,
            stock_quantity: 10,
            reorder_level: 5,
            expiry_date: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(product.can_sell(10));
        assert!(!product.can_sell(11));

        let mut inactive = product.clone();
        inactive.is_active = false;
        assert!(!inactive.can_sell(1));
    }

    #[test]
    fn test_low_stock() {
        let product = Product {
            id: "p1".to_string(),
            name: "Cough Syrup".to_string(),
            category_id: None,
            description: None,
            unit_price_cents: 4550,
            cost_price_cents: 3000,
            stock_quantity: 5,
            reorder_level: 5,
            expiry_date: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(product.is_low_stock());
    }
}
