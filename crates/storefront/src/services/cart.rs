//! Session-backed cart for signed-in users.
//!
//! Each mutation reads the cart from the session, applies the pure
//! [`Cart`] operation, writes the result back to the session and then
//! persists a copy to the [`CartStore`]. A failed copy is logged and does
//! not fail the request.

use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;

use boardquest_core::{Cart, Product, ProductId, QuantityChange, UserId};

use super::cart_store::CartStore;
use crate::models::session::keys;

/// Cart operations for one signed-in user.
pub struct CartService<'a> {
    session: &'a Session,
    store: &'a dyn CartStore,
    owner: UserId,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(session: &'a Session, store: &'a dyn CartStore, owner: UserId) -> Self {
        Self {
            session,
            store,
            owner,
        }
    }

    /// The cart as held in the session (empty if none yet).
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn current(&self) -> Result<Cart, SessionError> {
        Ok(self
            .session
            .get::<Cart>(keys::CART)
            .await?
            .unwrap_or_default())
    }

    /// Add one unit of `product`.
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn add(&self, product: &Product) -> Result<Cart, SessionError> {
        let cart = self.apply(|cart| cart.add(product)).await?;
        tracing::debug!(product_id = %product.id, count = cart.count(), "Added to cart");
        Ok(cart)
    }

    /// Step a line up or down; reaching zero removes it.
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        change: QuantityChange,
    ) -> Result<Cart, SessionError> {
        self.apply(|cart| cart.update_quantity(product_id, change))
            .await
    }

    /// Drop a line entirely.
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn remove(&self, product_id: ProductId) -> Result<Cart, SessionError> {
        self.apply(|cart| cart.remove(product_id)).await
    }

    /// Replace the session cart with the stored copy (sign-in).
    ///
    /// A missing or unreadable copy yields an empty cart.
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn restore(&self) -> Result<Cart, SessionError> {
        let cart = match self.store.load(self.owner).await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(user_id = %self.owner, error = %e, "Failed to load stored cart");
                Cart::new()
            }
        };
        self.session.insert(keys::CART, &cart).await?;
        Ok(cart)
    }

    /// Drop the session cart and the stored copy (sign-out).
    ///
    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn discard(&self) -> Result<(), SessionError> {
        self.session.remove_value(keys::CART).await?;
        if let Err(e) = self.store.clear(self.owner).await {
            tracing::warn!(user_id = %self.owner, error = %e, "Failed to clear stored cart");
        }
        Ok(())
    }

    async fn apply(&self, op: impl FnOnce(Cart) -> Cart + Send) -> Result<Cart, SessionError> {
        let cart = op(self.current().await?);
        self.session.insert(keys::CART, &cart).await?;
        if let Err(e) = self.store.save(self.owner, &cart).await {
            tracing::warn!(user_id = %self.owner, error = %e, "Failed to persist cart copy");
        }
        Ok(cart)
    }
}
