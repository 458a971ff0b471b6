//! # Cart Module
//!
//! The in-memory cart a cashier builds before checkout.
//!
//! ## Price Snapshots
//! Each cart line freezes the product's name and unit price at the moment
//! it is added. The checkout engine persists those snapshots, so a later
//! catalog price change never alters an historical sale.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Operations                                   │
//! │                                                                         │
//! │  Scan Product ───────────► add_item() ──────────► merge or push line   │
//! │  Change Quantity ────────► update_quantity() ───► line.qty = n         │
//! │  Remove Line ────────────► remove_item() ───────► lines.retain(...)    │
//! │  Checkout ───────────────► CheckoutEngine::checkout(&cart, ...)        │
//! │                                                                         │
//! │  The cart itself never touches the database; stock availability is     │
//! │  re-validated authoritatively inside the checkout transaction.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;
use crate::validation::validate_discount_cents;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Item
// =============================================================================

/// A pending, not-yet-persisted sale line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Product ID (UUID), used for the stock decrement at checkout.
    pub product_id: String,

    /// Product name at time of adding (frozen).
    pub name: String,

    /// Price in cents at time of adding (frozen). The checkout engine uses
    /// this snapshot, not a live re-read of the catalog.
    pub unit_price_cents: i64,

    /// Quantity in cart.
    pub quantity: i64,

    /// Line discount in cents, default 0.
    pub discount_cents: i64,

    /// When this item was added to the cart.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Creates a new cart item from a product and quantity.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price_cents: product.unit_price_cents,
            quantity,
            discount_cents: 0,
            added_at: Utc::now(),
        }
    }

    /// Calculates the line subtotal: quantity × unit price − discount.
    #[inline]
    pub fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity - self.discount_cents
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cashier's cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges)
/// - Quantity per line is in 1..=MAX_ITEM_QUANTITY
/// - At most MAX_CART_ITEMS distinct lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in the cart, in the order they were first added.
    pub items: Vec<CartItem>,

    /// When the cart was created/last cleared.
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a product to the cart, or increases quantity if already present.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        self.items.push(CartItem::from_product(product, quantity));
        Ok(())
    }

    /// Updates the quantity of a line; quantity 0 removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }

        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ItemNotInCart(product_id.to_string())),
        }
    }

    /// Applies a fixed discount (in cents) to a line.
    ///
    /// The discount must be non-negative and at most the line's
    /// undiscounted subtotal, so a discounted line never goes negative.
    pub fn apply_discount(&mut self, product_id: &str, discount_cents: i64) -> CoreResult<()> {
        validate_discount_cents(discount_cents)?;

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                let max = item.unit_price_cents * item.quantity;
                if discount_cents > max {
                    return Err(CoreError::DiscountTooLarge {
                        requested: discount_cents,
                        max,
                    });
                }
                item.discount_cents = discount_cents;
                Ok(())
            }
            None => Err(CoreError::ItemNotInCart(product_id.to_string())),
        }
    }

    /// Removes a line from the cart by product ID.
    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::ItemNotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Clears all lines from the cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    /// Returns the number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Calculates the cart total: Σ (quantity × unit price − discount).
    pub fn total_cents(&self) -> i64 {
        self.items.iter().map(|i| i.subtotal_cents()).sum()
    }

    /// The cart total as [`Money`].
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents())
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product(id: &str, name: &str, price_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            category_id: None,
            description: None,
            unit_price_cents: price_cents,
            cost_price_cents: price_cents / 2,
            stock_quantity: 100,
            reorder_level: 10,
            expiry_date: None,
            supplier_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_add_item() {
        let mut cart = Cart::new();
        let product = test_product("1", "Paracetamol 500mg", 500);

        cart.add_item(&product, 10).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 10);
        assert_eq!(cart.total_cents(), 5000);
    }

    #[test]
    fn test_cart_add_same_product_merges() {
        let mut cart = Cart::new();
        let product = test_product("1", "Paracetamol 500mg", 500);

        cart.add_item(&product, 2).unwrap();
        cart.add_item(&product, 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_cart_total_multiple_lines() {
        let mut cart = Cart::new();
        cart.add_item(&test_product("1", "Paracetamol 500mg", 500), 10)
            .unwrap();
        cart.add_item(&test_product("2", "Cough Syrup", 4550), 2)
            .unwrap();

        // 10 × ₱5.00 + 2 × ₱45.50 = ₱141.00
        assert_eq!(cart.total_cents(), 14100);
    }

    #[test]
    fn test_cart_discount_reduces_subtotal() {
        let mut cart = Cart::new();
        cart.add_item(&test_product("1", "Amoxicillin 250mg", 1200), 3)
            .unwrap();
        cart.apply_discount("1", 600).unwrap();

        assert_eq!(cart.total_cents(), 3000); // 3600 − 600
    }

    #[test]
    fn test_cart_discount_must_be_non_negative() {
        let mut cart = Cart::new();
        cart.add_item(&test_product("1", "Amoxicillin 250mg", 1200), 3)
            .unwrap();

        let err = cart.apply_discount("1", -500).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(cart.total_cents(), 3600);
    }

    #[test]
    fn test_cart_discount_capped_at_line_subtotal() {
        let mut cart = Cart::new();
        cart.add_item(&test_product("1", "Amoxicillin 250mg", 1200), 3)
            .unwrap();

        let err = cart.apply_discount("1", 5000).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DiscountTooLarge {
                requested: 5000,
                max: 3600
            }
        ));
        assert_eq!(cart.total_cents(), 3600);

        // The exact subtotal is allowed (a free line).
        cart.apply_discount("1", 3600).unwrap();
        assert_eq!(cart.total_cents(), 0);
    }

    #[test]
    fn test_cart_quantity_cap() {
        let mut cart = Cart::new();
        let product = test_product("1", "Paracetamol 500mg", 500);

        let err = cart.add_item(&product, 1000).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_update_and_remove() {
        let mut cart = Cart::new();
        let product = test_product("1", "Paracetamol 500mg", 500);

        cart.add_item(&product, 2).unwrap();
        cart.update_quantity("1", 5).unwrap();
        assert_eq!(cart.total_quantity(), 5);

        cart.update_quantity("1", 0).unwrap();
        assert!(cart.is_empty());

        assert!(matches!(
            cart.remove_item("1"),
            Err(CoreError::ItemNotInCart(_))
        ));
    }

    #[test]
    fn test_cart_clear() {
        let mut cart = Cart::new();
        cart.add_item(&test_product("1", "Cough Syrup", 4550), 2)
            .unwrap();
        assert!(!cart.is_empty());

        cart.clear();
        assert!(cart.is_empty());
    }
}
