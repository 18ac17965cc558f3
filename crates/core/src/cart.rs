//! Shopping cart state and its quantity rules.
//!
//! The cart is a plain value. Every operation consumes the current cart and
//! returns the next one, so callers (the session-backed cart service, tests)
//! decide where the state lives and when it is persisted.
//!
//! Rules:
//! - adding a product already in the cart bumps its quantity by one;
//! - adding a new product appends it with quantity one;
//! - decreasing a quantity below one removes the item;
//! - increasing has no upper bound.

use serde::{Deserialize, Serialize};

use crate::types::{Price, Product, ProductId};

/// Direction of a quantity change from the cart controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityChange {
    Increase,
    Decrease,
}

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CartItem {
    fn from_product(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            quantity: 1,
            image_url: product.image_url.clone(),
            description: product.description.clone(),
        }
    }

    /// Price times quantity for this line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// The cart: at most one item per product, in the order they were added.
///
/// Serializes as a bare JSON array, the same shape persisted per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add one unit of `product`.
    #[must_use]
    pub fn add(mut self, product: &Product) -> Self {
        match self.items.iter_mut().find(|item| item.id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(CartItem::from_product(product)),
        }
        self
    }

    /// Step the quantity of `product_id` up or down by one.
    ///
    /// Unknown ids leave the cart unchanged.
    #[must_use]
    pub fn update_quantity(mut self, product_id: ProductId, change: QuantityChange) -> Self {
        self.items.retain_mut(|item| {
            if item.id != product_id {
                return true;
            }
            match change {
                QuantityChange::Increase => {
                    item.quantity = item.quantity.saturating_add(1);
                    true
                }
                QuantityChange::Decrease => {
                    item.quantity = item.quantity.saturating_sub(1);
                    item.quantity > 0
                }
            }
        });
        self
    }

    /// Drop `product_id` whatever its quantity.
    #[must_use]
    pub fn remove(mut self, product_id: ProductId) -> Self {
        self.items.retain(|item| item.id != product_id);
        self
    }

    /// Empty the cart.
    #[must_use]
    pub fn clear(self) -> Self {
        Self::new()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units (the header badge).
    #[must_use]
    pub fn count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |sum, item| sum.saturating_add(item.quantity))
    }

    /// Σ(price × quantity) over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }
}
