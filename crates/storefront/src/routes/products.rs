//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use boardquest_core::{Product, ProductId};

use crate::backend::Caller;
use crate::error::{AppError, NoticeExt, Result};
use crate::state::AppState;

/// Product display data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    /// Price with the currency symbol (`"$25.50"`).
    pub price_display: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            price_display: product.price.display(),
            product,
        }
    }
}

/// Product listing data.
#[derive(Debug, Serialize)]
pub struct ProductsIndexView {
    pub products: Vec<ProductView>,
}

/// Display product listing, newest first.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<ProductsIndexView>> {
    let catalog = state.catalog();
    if !catalog.is_ready() {
        catalog
            .reload_products(state.tables())
            .await
            .or_notice("Failed to load products")?;
    }

    let products = catalog
        .products()
        .await
        .into_iter()
        .map(ProductView::from)
        .collect();
    Ok(Json(ProductsIndexView { products }))
}

/// Display a single product.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductView>> {
    find_product(&state, id).await.map(|p| Json(p.into()))
}

/// Look a product up in the snapshot, then in the store.
///
/// # Errors
///
/// Returns `AppError::NotFound` if neither has it.
pub async fn find_product(state: &AppState, id: ProductId) -> Result<Product> {
    if let Some(product) = state.catalog().product(id).await {
        return Ok(product);
    }

    state
        .products()
        .get(&Caller::Anonymous, id)
        .await
        .or_notice("Failed to load product")?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}
