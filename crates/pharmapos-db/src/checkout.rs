//! # Checkout Engine
//!
//! Owns the sale transaction: invoice allocation, sale + line-item
//! persistence, and stock decrement happen atomically or not at all.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Transaction                              │
//! │                                                                         │
//! │  checkout(cart, cashier, payment, tendered)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Validate: non-empty cart, quantities and discounts in range,       │
//! │     cash tendered covers the total                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. BEGIN ─┬─ per item: guarded stock decrement                        │
//! │            │     UPDATE products SET stock = stock - qty               │
//! │            │     WHERE id = ? AND is_active = 1 AND stock >= qty       │
//! │            │     0 rows → InsufficientStock, ROLLBACK                  │
//! │            ├─ allocate invoice INV-YYYYMMDD-NNNN (max existing + 1)    │
//! │            ├─ INSERT sale (status = completed)                         │
//! │            ├─ per item: INSERT sale_item (name/price snapshot)         │
//! │            └─ COMMIT                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Invoice UNIQUE violation or busy database? → retry from step 2     │
//! │     (fresh max re-read, up to 3 attempts)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. Best-effort audit entry, build receipt                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stock decrement goes first so the transaction's opening statement
//! is a write: the connection takes SQLite's write lock up front (waiting
//! within the pool's busy timeout), and the invoice max-read that follows
//! happens under that lock. Invoice allocation is therefore serialized in
//! the common case; the UNIQUE index and the retry loop remain as the
//! backstop.
//!
//! Voiding is the compensating write: restore stock, flip the status to
//! `voided`. The invoice number stays burned so the sequence never reuses
//! a number a printed receipt may carry.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::AuditLogRepository;
use pharmapos_core::{
    validation::{validate_discount_cents, validate_quantity},
    Cart, Money, PaymentMethod, Permission, Receipt, ReceiptLine, Sale, SaleStatus, SessionUser,
    ValidationError,
};

/// Attempts at the full checkout transaction before giving up on invoice
/// allocation races or a busy database.
const MAX_INVOICE_RETRIES: u32 = 3;

/// Errors from checkout and void operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cannot check out an empty cart")]
    EmptyCart,

    #[error("invalid cart line: {0}")]
    InvalidLine(#[from] ValidationError),

    #[error("discount {discount} on '{product}' exceeds the line subtotal ({max})")]
    DiscountTooLarge {
        product: String,
        discount: i64,
        max: i64,
    },

    #[error("cash tendered {tendered} does not cover total {total}")]
    InsufficientCash { tendered: Money, total: Money },

    #[error("insufficient stock for '{product}': {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    #[error("product '{0}' is no longer available for sale")]
    ProductUnavailable(String),

    #[error("sale not found: {0}")]
    SaleNotFound(String),

    #[error("sale {sale_id} cannot be voided from status {status}")]
    InvalidState { sale_id: String, status: SaleStatus },

    #[error("user lacks permission for this operation")]
    PermissionDenied,

    #[error("database error: {0}")]
    Persistence(#[from] DbError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        CheckoutError::Persistence(DbError::from(err))
    }
}

/// Engine for the sale lifecycle: checkout and void.
#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    pool: SqlitePool,
}

impl CheckoutEngine {
    /// Creates a new CheckoutEngine.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutEngine { pool }
    }

    /// Completes a sale from the cart's contents.
    ///
    /// On success the sale, its line items, and the stock decrements are
    /// all committed, and the returned receipt reflects exactly what was
    /// persisted. On any error nothing is written.
    ///
    /// `cash_tendered` is required for cash payments and ignored for card
    /// and mobile payments, whose change is always zero.
    pub async fn checkout(
        &self,
        cart: &Cart,
        cashier: &SessionUser,
        payment_method: PaymentMethod,
        cash_tendered: Option<Money>,
        notes: Option<String>,
    ) -> Result<Receipt, CheckoutError> {
        if !cashier.has_permission(Permission::Sell) {
            return Err(CheckoutError::PermissionDenied);
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        // The cart enforces these on its mutators; re-checked here so a
        // line edited after a discount was applied can never persist a
        // negative subtotal.
        for item in &cart.items {
            validate_quantity(item.quantity)?;
            validate_discount_cents(item.discount_cents)?;
            if item.subtotal_cents() < 0 {
                return Err(CheckoutError::DiscountTooLarge {
                    product: item.name.clone(),
                    discount: item.discount_cents,
                    max: item.unit_price_cents * item.quantity,
                });
            }
        }

        let total = cart.total();

        // Change is computed up front so a short payment never reaches the
        // database at all.
        let (tendered_cents, change_cents) = match payment_method {
            PaymentMethod::Cash => {
                let tendered = cash_tendered.unwrap_or(Money::zero());
                if tendered < total {
                    return Err(CheckoutError::InsufficientCash { tendered, total });
                }
                (Some(tendered.cents()), (tendered - total).cents())
            }
            _ => (None, 0),
        };

        let mut attempt = 0;
        let (sale_id, invoice_number, created_at) = loop {
            attempt += 1;

            match self
                .try_checkout_once(cart, cashier, payment_method, tendered_cents, change_cents, &notes)
                .await
            {
                Ok(result) => break result,
                Err(CheckoutError::Persistence(ref db_err))
                    if (db_err.is_unique_violation_on("invoice_number") || db_err.is_busy())
                        && attempt < MAX_INVOICE_RETRIES =>
                {
                    debug!(attempt, error = %db_err, "Checkout contention, retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        };

        info!(
            invoice = %invoice_number,
            total = %total,
            items = cart.item_count(),
            cashier = %cashier.username,
            "Sale completed"
        );

        self.audit_best_effort(
            &cashier.id,
            "sale",
            "sales",
            &sale_id,
            &serde_json::json!({
                "invoice_number": invoice_number,
                "total_cents": total.cents(),
                "payment_method": payment_method.as_str(),
                "items": cart.item_count(),
            })
            .to_string(),
        )
        .await;

        let lines = cart
            .items
            .iter()
            .map(|item| ReceiptLine {
                product_name: item.name.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents(),
            })
            .collect();

        Ok(Receipt {
            sale_id,
            invoice_number,
            lines,
            total_cents: total.cents(),
            payment_method,
            cash_tendered_cents: tendered_cents,
            change_cents,
            cashier_name: cashier.full_name.clone(),
            created_at,
            notes,
        })
    }

    /// One attempt at the checkout transaction. A unique violation on the
    /// invoice number or a busy database means another checkout got in
    /// the way; the caller retries with a fresh read.
    ///
    /// The stock decrements come first: the opening write statement takes
    /// the write lock for the rest of the transaction, so the invoice
    /// max-read below it cannot interleave with another writer.
    async fn try_checkout_once(
        &self,
        cart: &Cart,
        cashier: &SessionUser,
        payment_method: PaymentMethod,
        tendered_cents: Option<i64>,
        change_cents: i64,
        notes: &Option<String>,
    ) -> Result<(String, String, DateTime<Utc>), CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();

        for item in &cart.items {
            // Guarded decrement: the WHERE clause makes the stock check and
            // the write one atomic statement, so two concurrent sales can
            // never both take the last unit.
            let decremented = sqlx::query(
                "UPDATE products
                 SET stock_quantity = stock_quantity - ?1, updated_at = ?3
                 WHERE id = ?2 AND is_active = 1 AND stock_quantity >= ?1",
            )
            .bind(item.quantity)
            .bind(&item.product_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if decremented.rows_affected() == 0 {
                // Transaction rolls back on drop; nothing written so far
                // survives. Re-read outside the guard only to name the
                // reason in the error.
                let state: Option<(i64, bool)> = sqlx::query_as(
                    "SELECT stock_quantity, is_active FROM products WHERE id = ?1",
                )
                .bind(&item.product_id)
                .fetch_optional(&mut *tx)
                .await?;

                return Err(match state {
                    Some((available, true)) => CheckoutError::InsufficientStock {
                        product: item.name.clone(),
                        available,
                        requested: item.quantity,
                    },
                    _ => CheckoutError::ProductUnavailable(item.name.clone()),
                });
            }
        }

        let invoice_number = allocate_invoice_number(&mut tx, now).await?;
        let sale_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO sales (
                id, invoice_number, user_id, total_amount_cents,
                payment_method, cash_tendered_cents, change_cents,
                status, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&sale_id)
        .bind(&invoice_number)
        .bind(&cashier.id)
        .bind(cart.total_cents())
        .bind(payment_method)
        .bind(tendered_cents)
        .bind(change_cents)
        .bind(SaleStatus::Completed)
        .bind(notes.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &cart.items {
            sqlx::query(
                "INSERT INTO sale_items (
                    id, sale_id, product_id, name_snapshot,
                    unit_price_cents, quantity, discount_cents, subtotal_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&sale_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.discount_cents)
            .bind(item.subtotal_cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((sale_id, invoice_number, now))
    }

    /// Voids a completed sale, restoring the stock its items consumed.
    ///
    /// Only `completed` sales can be voided, and only by users holding the
    /// void permission. Voiding is not idempotent: a second attempt fails
    /// with `InvalidState`. The invoice number is never reissued.
    pub async fn void_sale(
        &self,
        sale_id: &str,
        acting_user: &SessionUser,
    ) -> Result<Sale, CheckoutError> {
        if !acting_user.has_permission(Permission::VoidSale) {
            return Err(CheckoutError::PermissionDenied);
        }

        let mut tx = self.pool.begin().await?;

        let sale = sqlx::query_as::<_, Sale>(
            "SELECT id, invoice_number, user_id, total_amount_cents, payment_method,
                    cash_tendered_cents, change_cents, status, notes, created_at,
                    voided_at, voided_by
             FROM sales WHERE id = ?1",
        )
        .bind(sale_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CheckoutError::SaleNotFound(sale_id.to_string()))?;

        if sale.status != SaleStatus::Completed {
            return Err(CheckoutError::InvalidState {
                sale_id: sale_id.to_string(),
                status: sale.status,
            });
        }

        let now = Utc::now();

        // Restoration is unconditional: the units were taken from stock by
        // this sale, so they go back even if the product was deactivated
        // in the meantime. SUM covers a product appearing on several lines.
        let restored = sqlx::query(
            "UPDATE products
             SET stock_quantity = stock_quantity + (
                     SELECT SUM(quantity) FROM sale_items
                     WHERE sale_id = ?1 AND product_id = products.id
                 ),
                 updated_at = ?2
             WHERE id IN (SELECT product_id FROM sale_items WHERE sale_id = ?1)",
        )
        .bind(sale_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        debug!(sale_id = %sale_id, products = restored.rows_affected(), "Restored stock");

        // Status guard repeated in the WHERE clause so a concurrent void
        // loses cleanly instead of double-restoring.
        let flipped = sqlx::query(
            "UPDATE sales
             SET status = ?2, voided_at = ?3, voided_by = ?4
             WHERE id = ?1 AND status = ?5",
        )
        .bind(sale_id)
        .bind(SaleStatus::Voided)
        .bind(now)
        .bind(&acting_user.id)
        .bind(SaleStatus::Completed)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            return Err(CheckoutError::InvalidState {
                sale_id: sale_id.to_string(),
                status: SaleStatus::Voided,
            });
        }

        tx.commit().await?;

        info!(
            invoice = %sale.invoice_number,
            voided_by = %acting_user.username,
            "Sale voided"
        );

        self.audit_best_effort(
            &acting_user.id,
            "void",
            "sales",
            sale_id,
            &serde_json::json!({
                "invoice_number": sale.invoice_number,
                "total_cents": sale.total_amount_cents,
            })
            .to_string(),
        )
        .await;

        Ok(Sale {
            status: SaleStatus::Voided,
            voided_at: Some(now),
            voided_by: Some(acting_user.id.clone()),
            ..sale
        })
    }

    /// Audit writes never fail the operation they describe. `details` is
    /// a serialized JSON payload describing what happened.
    async fn audit_best_effort(
        &self,
        user_id: &str,
        action: &str,
        table: &str,
        record_id: &str,
        details: &str,
    ) {
        let audit = AuditLogRepository::new(self.pool.clone());
        if let Err(err) = audit
            .log(Some(user_id), action, table, Some(record_id), details)
            .await
        {
            warn!(error = %err, action = %action, "Audit log write failed");
        }
    }
}

/// Allocates the next invoice number for `now`'s calendar date.
///
/// Format is `INV-YYYYMMDD-NNNN` with a zero-padded sequence starting at
/// 0001 each day. The read happens inside the caller's transaction; the
/// UNIQUE index on `sales.invoice_number` is the backstop when two
/// transactions read the same maximum, and the caller retries on that
/// collision.
async fn allocate_invoice_number(
    tx: &mut Transaction<'_, Sqlite>,
    now: DateTime<Utc>,
) -> Result<String, DbError> {
    let date_part = now.format("%Y%m%d").to_string();
    let prefix = format!("INV-{}-", date_part);

    let max_existing: Option<String> = sqlx::query_scalar(
        "SELECT MAX(invoice_number) FROM sales WHERE invoice_number LIKE ?1",
    )
    .bind(format!("{}%", prefix))
    .fetch_one(&mut **tx)
    .await?;

    let next_seq = max_existing
        .as_deref()
        .and_then(|inv| inv.rsplit('-').next())
        .and_then(|seq| seq.parse::<u32>().ok())
        .map_or(1, |seq| seq + 1);

    Ok(format!("{}{:04}", prefix, next_seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::pool::{Database, DbConfig};
    use pharmapos_core::{Product, Role, User};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    async fn insert_user(db: &Database, username: &str, role: Role) -> SessionUser {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password("test-password").unwrap(),
            full_name: format!("Test {}", username),
            role,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        };
        db.users().insert(&user).await.unwrap();
        SessionUser {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
        }
    }

    async fn insert_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category_id: None,
            description: None,
            unit_price_cents: price_cents,
            cost_price_cents: price_cents / 2,
            stock_quantity: stock,
            reorder_level: 10,
            expiry_date: None,
            supplier_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn cash_checkout_persists_sale_and_decrements_stock() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let paracetamol = insert_product(&db, "Paracetamol 500mg", 500, 100).await;
        let syrup = insert_product(&db, "Cough Syrup 120ml", 4550, 50).await;

        let mut cart = Cart::new();
        cart.add_item(&paracetamol, 10).unwrap();
        cart.add_item(&syrup, 2).unwrap();

        let receipt = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(20000)),
                None,
            )
            .await
            .unwrap();

        // 10 × ₱5.00 + 2 × ₱45.50 = ₱141.00, tendered ₱200.00
        assert_eq!(receipt.total_cents, 14100);
        assert_eq!(receipt.change_cents, 5900);
        assert_eq!(receipt.lines.len(), 2);

        let today = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(receipt.invoice_number, format!("INV-{}-0001", today));

        let sale = db
            .sales()
            .get_by_id(&receipt.sale_id)
            .await
            .unwrap()
            .expect("sale persisted");
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.total_amount_cents, 14100);
        assert_eq!(sale.cash_tendered_cents, Some(20000));
        assert_eq!(sale.change_cents, 5900);

        let items = db.sales().items_for_sale(&receipt.sale_id).await.unwrap();
        assert_eq!(items.len(), 2);

        let p = db.products().get_by_id(&paracetamol.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 90);
        let s = db.products().get_by_id(&syrup.id).await.unwrap().unwrap();
        assert_eq!(s.stock_quantity, 48);
    }

    #[tokio::test]
    async fn invoice_numbers_are_sequential_within_a_day() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Vitamin C 500mg", 600, 100).await;

        let today = Utc::now().format("%Y%m%d").to_string();

        for expected in ["0001", "0002", "0003"] {
            let mut cart = Cart::new();
            cart.add_item(&product, 1).unwrap();

            let receipt = db
                .checkout()
                .checkout(
                    &cart,
                    &cashier,
                    PaymentMethod::Cash,
                    Some(Money::from_cents(600)),
                    None,
                )
                .await
                .unwrap();

            assert_eq!(receipt.invoice_number, format!("INV-{}-{}", today, expected));
        }
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_the_whole_sale() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let plenty = insert_product(&db, "Plentiful", 1000, 100).await;
        let scarce = insert_product(&db, "Scarce", 2000, 3).await;

        let mut cart = Cart::new();
        cart.add_item(&plenty, 5).unwrap();
        cart.add_item(&scarce, 4).unwrap();

        let err = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(100_000)),
                None,
            )
            .await
            .unwrap_err();

        match err {
            CheckoutError::InsufficientStock {
                product,
                available,
                requested,
            } => {
                assert_eq!(product, "Scarce");
                assert_eq!(available, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing from the failed checkout survives: the first line's
        // decrement is rolled back too, and no sale was written.
        let p = db.products().get_by_id(&plenty.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 100);
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
        assert_eq!(db.sales().count_for_date(Utc::now().date_naive()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn short_cash_payment_is_rejected_before_any_write() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Ibuprofen 200mg", 750, 20).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 2).unwrap();

        let err = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(1000)),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InsufficientCash { .. }));

        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 20);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;

        let err = db
            .checkout()
            .checkout(&Cart::new(), &cashier, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn card_payment_carries_no_tendered_or_change() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Multivitamins", 1500, 30).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 3).unwrap();

        let receipt = db
            .checkout()
            .checkout(&cart, &cashier, PaymentMethod::CreditCard, None, None)
            .await
            .unwrap();

        assert_eq!(receipt.total_cents, 4500);
        assert_eq!(receipt.cash_tendered_cents, None);
        assert_eq!(receipt.change_cents, 0);
    }

    #[tokio::test]
    async fn void_restores_stock_and_is_not_idempotent() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let pharmacist = insert_user(&db, "pharmacist1", Role::Pharmacist).await;
        let product = insert_product(&db, "Amoxicillin 500mg", 1200, 50).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 5).unwrap();

        let receipt = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(6000)),
                None,
            )
            .await
            .unwrap();

        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 45);

        let voided = db
            .checkout()
            .void_sale(&receipt.sale_id, &pharmacist)
            .await
            .unwrap();
        assert_eq!(voided.status, SaleStatus::Voided);
        assert_eq!(voided.voided_by.as_deref(), Some(pharmacist.id.as_str()));
        assert!(voided.voided_at.is_some());

        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 50);

        // Second void must fail and must not restore stock again.
        let err = db
            .checkout()
            .void_sale(&receipt.sale_id, &pharmacist)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidState { .. }));

        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 50);
    }

    #[tokio::test]
    async fn cashier_cannot_void() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Aspirin 80mg", 400, 20).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 1).unwrap();

        let receipt = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(400)),
                None,
            )
            .await
            .unwrap();

        let err = db
            .checkout()
            .void_sale(&receipt.sale_id, &cashier)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PermissionDenied));

        let sale = db.sales().get_by_id(&receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Completed);
    }

    #[tokio::test]
    async fn voiding_a_missing_sale_fails() {
        let db = test_db().await;
        let admin = insert_user(&db, "admin", Role::Admin).await;

        let err = db
            .checkout()
            .void_sale("no-such-sale", &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SaleNotFound(_)));
    }

    #[tokio::test]
    async fn void_does_not_free_the_invoice_number() {
        let db = test_db().await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let product = insert_product(&db, "Zinc 10mg", 700, 30).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 1).unwrap();
        let first = db
            .checkout()
            .checkout(
                &cart,
                &admin,
                PaymentMethod::Cash,
                Some(Money::from_cents(700)),
                None,
            )
            .await
            .unwrap();

        db.checkout().void_sale(&first.sale_id, &admin).await.unwrap();

        let mut cart = Cart::new();
        cart.add_item(&product, 1).unwrap();
        let second = db
            .checkout()
            .checkout(
                &cart,
                &admin,
                PaymentMethod::Cash,
                Some(Money::from_cents(700)),
                None,
            )
            .await
            .unwrap();

        let today = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(first.invoice_number, format!("INV-{}-0001", today));
        assert_eq!(second.invoice_number, format!("INV-{}-0002", today));
    }

    #[tokio::test]
    async fn line_discount_reduces_the_total() {
        let db = test_db().await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let product = insert_product(&db, "Lozenges Menthol 10s", 3000, 30).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 2).unwrap();
        cart.apply_discount(&product.id, 500).unwrap();

        let receipt = db
            .checkout()
            .checkout(
                &cart,
                &admin,
                PaymentMethod::Cash,
                Some(Money::from_cents(5500)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(receipt.total_cents, 5500);
        assert_eq!(receipt.change_cents, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_all_commit_with_distinct_invoices() {
        // File-backed pool with one connection per task, so the checkouts
        // genuinely contend for SQLite's write lock.
        let path = std::env::temp_dir().join(format!("pharmapos-test-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(8))
            .await
            .unwrap();
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Saline Solution 500ml", 900, 100).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let cashier = cashier.clone();
            let product = product.clone();
            handles.push(tokio::spawn(async move {
                let mut cart = Cart::new();
                cart.add_item(&product, 1).unwrap();
                db.checkout()
                    .checkout(
                        &cart,
                        &cashier,
                        PaymentMethod::Cash,
                        Some(Money::from_cents(900)),
                        None,
                    )
                    .await
            }));
        }

        let mut invoices = std::collections::HashSet::new();
        for handle in handles {
            let receipt = handle.await.unwrap().expect("every checkout commits");
            invoices.insert(receipt.invoice_number);
        }

        // All eight succeeded, no duplicates, and the sequence is dense.
        let today = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(invoices.len(), 8);
        for seq in 1..=8 {
            assert!(invoices.contains(&format!("INV-{}-{:04}", today, seq)));
        }

        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 92);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn negative_discount_is_rejected_before_any_write() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Bandages 5m", 2000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 1).unwrap();
        // Bypasses the cart's own guard, as a deserialized cart could.
        cart.items[0].discount_cents = -500;

        let err = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(10_000)),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidLine(_)));

        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 10);
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn discount_exceeding_the_line_subtotal_is_rejected() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let cheap = insert_product(&db, "Cotton Balls 50s", 2000, 10).await;
        let dear = insert_product(&db, "Thermometer Digital", 10_000, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&cheap, 2).unwrap();
        cart.add_item(&dear, 1).unwrap();
        cart.apply_discount(&cheap.id, 4000).unwrap();
        // Shrinking the line afterwards leaves the discount oversized even
        // though the cart total stays positive.
        cart.update_quantity(&cheap.id, 1).unwrap();
        assert!(cart.total_cents() > 0);

        let err = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(20_000)),
                None,
            )
            .await
            .unwrap_err();
        match err {
            CheckoutError::DiscountTooLarge { discount, max, .. } => {
                assert_eq!(discount, 4000);
                assert_eq!(max, 2000);
            }
            other => panic!("expected DiscountTooLarge, got {other:?}"),
        }

        let p = db.products().get_by_id(&cheap.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 10);
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_audit_entry_carries_a_json_payload() {
        let db = test_db().await;
        let cashier = insert_user(&db, "cashier1", Role::Cashier).await;
        let product = insert_product(&db, "Eye Drops 10ml", 2500, 10).await;

        let mut cart = Cart::new();
        cart.add_item(&product, 2).unwrap();
        let receipt = db
            .checkout()
            .checkout(
                &cart,
                &cashier,
                PaymentMethod::Cash,
                Some(Money::from_cents(5000)),
                None,
            )
            .await
            .unwrap();

        let entries = db.audit().for_record("sales", &receipt.sale_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        let details: serde_json::Value = serde_json::from_str(&entries[0].details).unwrap();
        assert_eq!(details["invoice_number"], receipt.invoice_number.as_str());
        assert_eq!(details["total_cents"], 5000);
        assert_eq!(details["payment_method"], "cash");
    }

    #[tokio::test]
    async fn void_restores_the_sum_across_repeated_product_lines() {
        let db = test_db().await;
        let admin = insert_user(&db, "admin", Role::Admin).await;
        let product = insert_product(&db, "Gauze Pads 10s", 800, 35).await;

        // Two lines for the same product, as an imported sale may carry;
        // the cart normally merges them.
        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sales (
                id, invoice_number, user_id, total_amount_cents,
                payment_method, cash_tendered_cents, change_cents,
                status, created_at
             ) VALUES (?1, ?2, ?3, 4000, 'cash', 4000, 0, 'completed', ?4)",
        )
        .bind(&sale_id)
        .bind("INV-20250101-0001")
        .bind(&admin.id)
        .bind(now)
        .execute(db.pool())
        .await
        .unwrap();

        for quantity in [2i64, 3] {
            sqlx::query(
                "INSERT INTO sale_items (
                    id, sale_id, product_id, name_snapshot,
                    unit_price_cents, quantity, discount_cents, subtotal_cents, created_at
                 ) VALUES (?1, ?2, ?3, ?4, 800, ?5, 0, ?6, ?7)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&sale_id)
            .bind(&product.id)
            .bind(&product.name)
            .bind(quantity)
            .bind(800 * quantity)
            .bind(now)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let voided = db.checkout().void_sale(&sale_id, &admin).await.unwrap();
        assert_eq!(voided.status, SaleStatus::Voided);

        // Both lines restored: 35 + 2 + 3.
        let p = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(p.stock_quantity, 40);
    }

    #[test]
    fn invoice_sequence_parses_and_increments() {
        let max = Some("INV-20250115-0042".to_string());
        let next = max
            .as_deref()
            .and_then(|inv| inv.rsplit('-').next())
            .and_then(|seq| seq.parse::<u32>().ok())
            .map_or(1, |seq| seq + 1);
        assert_eq!(next, 43);
    }

    #[test]
    fn invoice_sequence_starts_at_one_when_day_is_empty() {
        let max: Option<String> = None;
        let next = max
            .as_deref()
            .and_then(|inv| inv.rsplit('-').next())
            .and_then(|seq| seq.parse::<u32>().ok())
            .map_or(1, |seq| seq + 1);
        assert_eq!(next, 1);
    }
}
