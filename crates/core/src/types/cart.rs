//! Shopping cart contents and derived views.
//!
//! A [`Cart`] holds at most one [`CartItem`] per product ID and never stores a
//! zero quantity. All mutations here are pure; persistence and ownership are
//! handled by the client crate.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// A product as offered for adding to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identity.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Optional image URL.
    #[serde(default)]
    pub image: Option<String>,
}

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identity.
    pub id: ProductId,
    /// Display name captured when the product was added.
    pub name: String,
    /// Unit price captured when the product was added.
    pub price: Price,
    /// Optional image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Quantity, always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Create a line for `product` with a quantity of 1.
    #[must_use]
    pub fn from_product(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            image: product.image,
            quantity: 1,
        }
    }

    /// Price multiplied by quantity, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price
            .amount()
            .checked_mul(Decimal::from(self.quantity))
            .unwrap_or(Decimal::MAX)
    }
}

/// Aggregates derived from a cart's items.
///
/// Never stored; always recomputed from the cart it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CartView {
    /// Sum of `price * quantity` across all items.
    pub total: Decimal,
    /// Sum of quantities across all items.
    pub count: u64,
}

/// An ordered sequence of cart items, unique by product ID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from raw items.
    ///
    /// Lines with a zero quantity are dropped and duplicate product IDs are
    /// folded into the first occurrence.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            cart.absorb(item);
        }
        cart
    }

    /// The items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn get_mut(&mut self, id: &ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Add one unit of `product`.
    ///
    /// Increments the existing line if the product is already present,
    /// otherwise appends a new line with quantity 1.
    pub fn add(&mut self, product: Product) {
        if let Some(existing) = self.get_mut(&product.id) {
            existing.quantity = existing.quantity.saturating_add(1);
        } else {
            self.items.push(CartItem::from_product(product));
        }
    }

    /// Set the quantity of a line.
    ///
    /// A quantity of zero or less removes the line. Returns `false` when the
    /// product is not in the cart or the quantity is unchanged.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.get_mut(id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove a line. Returns `false` if it was not present.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    /// Remove every line. Returns `false` if the cart was already empty.
    pub fn clear(&mut self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.items.clear();
        true
    }

    /// Merge `other` into this cart additively.
    ///
    /// For products present in both carts, this cart's line keeps its name,
    /// price, and image and only the quantities are summed. Products only in
    /// `other` are appended in `other`'s order.
    pub fn merge(&mut self, other: &Self) {
        for item in &other.items {
            self.absorb(item.clone());
        }
    }

    fn absorb(&mut self, item: CartItem) {
        if let Some(existing) = self.get_mut(&item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Sum of `price * quantity`, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(CartItem::line_total)
            .try_fold(Decimal::ZERO, Decimal::checked_add)
            .unwrap_or(Decimal::MAX)
    }

    /// Sum of quantities.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Derived aggregate view.
    #[must_use]
    pub fn view(&self) -> CartView {
        CartView {
            total: self.total(),
            count: self.count(),
        }
    }

    /// Product ID to quantity mapping, independent of line order.
    #[must_use]
    pub fn quantities(&self) -> BTreeMap<ProductId, u32> {
        self.items
            .iter()
            .map(|item| (item.id.clone(), item.quantity))
            .collect()
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_cents(cents).unwrap(),
            image: None,
        }
    }

    fn line(id: &str, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            quantity,
            ..CartItem::from_product(product(id, cents))
        }
    }

    #[test]
    fn test_add_increments_existing_line() {
        let mut cart = Cart::new();
        cart.add(product("1", 1000));
        cart.add(product("1", 1000));
        cart.add(product("2", 500));

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get(&ProductId::new("1")).unwrap().quantity, 2);
    }

    #[test]
    fn test_quantity_floor_removes_line() {
        let mut cart = Cart::from_items([line("1", 1000, 2), line("2", 500, 1)]);

        assert!(cart.set_quantity(&ProductId::new("1"), 0));
        assert!(cart.get(&ProductId::new("1")).is_none());

        assert!(cart.set_quantity(&ProductId::new("2"), -5));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_id_is_noop() {
        let mut cart = Cart::from_items([line("1", 1000, 2)]);
        assert!(!cart.set_quantity(&ProductId::new("missing"), 3));
        assert_eq!(cart.count(), 2);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::from_items([line("1", 1000, 1)]);
        assert!(!cart.remove(&ProductId::new("nope")));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_derived_view() {
        let cart = Cart::from_items([line("a", 1000, 2), line("b", 500, 3)]);
        let view = cart.view();
        assert_eq!(view.total, Decimal::new(35, 0));
        assert_eq!(view.count, 5);
    }

    #[test]
    fn test_huge_prices_saturate_instead_of_overflowing() {
        let huge = CartItem {
            price: Price::new(Decimal::MAX).unwrap(),
            ..line("big", 0, 2)
        };
        assert_eq!(huge.line_total(), Decimal::MAX);

        let cart = Cart::from_items([huge, line("small", 100, 1)]);
        let view = cart.view();
        assert_eq!(view.total, Decimal::MAX);
        assert_eq!(view.count, 3);
    }

    #[test]
    fn test_clear_reports_change() {
        let mut cart = Cart::from_items([line("1", 1000, 1)]);
        assert!(cart.clear());
        assert!(!cart.clear());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_sums_quantities_and_keeps_base_fields() {
        let mut user = Cart::from_items([CartItem {
            name: "User copy".to_string(),
            ..line("1", 1000, 1)
        }]);
        let guest = Cart::from_items([
            CartItem {
                name: "Guest copy".to_string(),
                ..line("1", 1200, 2)
            },
            line("2", 500, 1),
        ]);

        user.merge(&guest);

        let quantities = user.quantities();
        assert_eq!(quantities.get(&ProductId::new("1")), Some(&3));
        assert_eq!(quantities.get(&ProductId::new("2")), Some(&1));

        let shared = user.get(&ProductId::new("1")).unwrap();
        assert_eq!(shared.name, "User copy");
        assert_eq!(shared.price, Price::from_cents(1000).unwrap());
    }

    #[test]
    fn test_deserialize_normalizes_items() {
        let json = r#"[
            {"id":"1","name":"A","price":"10","quantity":1},
            {"id":"1","name":"A","price":"10","quantity":2},
            {"id":"2","name":"B","price":"5","quantity":0}
        ]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.count(), 3);
    }
}
