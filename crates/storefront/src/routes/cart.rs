//! Cart route handlers.
//!
//! The cart lives in the session of a signed-in user; changing it requires
//! authentication. Every mutation returns the updated cart view so the
//! client can redraw the cart and the header badge from one response.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use boardquest_core::{Cart, CartItem, ProductId, QuantityChange};

use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::WithNotice;
use crate::routes::products::find_product;
use crate::state::AppState;

const SIGN_IN_TO_ADD: &str = "Please sign in to add items to cart";

/// Cart item display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: CartItem,
    pub price: String,
    pub line_price: String,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            price: item.price.display(),
            line_price: item.line_total().display(),
            item: item.clone(),
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    /// Two-decimal total without the symbol (`"25.50"`).
    pub total: String,
    /// Total with the currency symbol (`"$25.50"`).
    pub subtotal: String,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let total = cart.total();
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            item_count: cart.count(),
            total: total.to_fixed(),
            subtotal: total.display(),
        }
    }
}

/// Cart count badge data.
#[derive(Debug, Serialize)]
pub struct CartCountView {
    pub count: u32,
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
}

/// Update cart request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub change: QuantityChange,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

async fn current_cart(state: &AppState, session: &Session, auth: OptionalAuth) -> Result<Cart> {
    match auth.0 {
        Some(user) => Ok(state.cart(session, user.id).current().await?),
        None => Ok(Cart::new()),
    }
}

/// Display the cart.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<Json<CartView>> {
    let cart = current_cart(&state, &session, auth).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add one unit of a product to the cart.
#[instrument(skip(state, session, auth), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(form): Json<AddToCartForm>,
) -> Result<Json<WithNotice<CartView>>> {
    let Some(user) = auth.0 else {
        return Err(AppError::Unauthorized(SIGN_IN_TO_ADD.to_string()));
    };

    let product = find_product(&state, form.product_id).await?;
    let cart = state.cart(&session, user.id).add(&product).await?;
    Ok(Json(WithNotice::success("Added to cart", CartView::from(&cart))))
}

/// Step a cart line up or down.
#[instrument(skip(state, session, user), fields(product_id = %form.product_id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(form): Json<UpdateCartForm>,
) -> Result<Json<CartView>> {
    let cart = state
        .cart(&session, user.id)
        .update_quantity(form.product_id, form.change)
        .await?;
    Ok(Json(CartView::from(&cart)))
}

/// Remove a line from the cart.
#[instrument(skip(state, session, user), fields(product_id = %form.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(form): Json<RemoveFromCartForm>,
) -> Result<Json<CartView>> {
    let cart = state.cart(&session, user.id).remove(form.product_id).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Get the cart item count for the header badge.
#[instrument(skip(state, session, auth))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<Json<CartCountView>> {
    let cart = current_cart(&state, &session, auth).await?;
    Ok(Json(CartCountView {
        count: cart.count(),
    }))
}
