//! Admin product management.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use boardquest_core::{ProductDraft, ProductId};

use super::form::AdminForm;
use super::refresh_products;
use crate::error::{AppError, NoticeExt, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::WithNotice;
use crate::routes::products::{ProductView, ProductsIndexView};
use crate::state::AppState;

/// Response to a delete.
#[derive(Debug, Serialize)]
pub struct DeletedView {
    pub id: ProductId,
}

fn draft_from(form: &AdminForm) -> Result<ProductDraft> {
    Ok(ProductDraft::parse(
        form.text("name"),
        form.text("price"),
        Some(form.text("description")),
    )?)
}

/// List all products, bypassing the live snapshot.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<ProductsIndexView>> {
    let caller = state.auth(&session).caller().await?;
    let products = state
        .products()
        .list(&caller)
        .await
        .or_notice("Failed to load products")?;
    Ok(Json(ProductsIndexView {
        products: products.into_iter().map(ProductView::from).collect(),
    }))
}

/// Create a product, uploading its image first if one was attached.
#[instrument(skip(state, session, admin, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<Json<WithNotice<ProductView>>> {
    let form = AdminForm::read(multipart).await?;
    let draft = draft_from(&form)?;
    let caller = state.auth(&session).caller().await?;

    let image_url = match form.image {
        Some(image) => Some(
            state
                .uploads()
                .upload_product_image(&caller, image)
                .await
                .or_notice("Failed to save product")?,
        ),
        None => None,
    };

    let product = state
        .products()
        .create(&caller, &draft.with_image(image_url))
        .await
        .or_notice("Failed to save product")?;
    let product_id = product.id.to_string();
    add_breadcrumb("admin", "Product created", Some(&[("product_id", product_id.as_str())][..]));
    refresh_products(&state).await;

    Ok(Json(WithNotice::success(
        "Product added successfully",
        product.into(),
    )))
}

/// Update a product, keeping its current image unless a new one is sent.
#[instrument(skip(state, session, admin, multipart), fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<WithNotice<ProductView>>> {
    let form = AdminForm::read(multipart).await?;
    let draft = draft_from(&form)?;
    let caller = state.auth(&session).caller().await?;

    let existing = state
        .products()
        .get(&caller, id)
        .await
        .or_notice("Failed to save product")?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let image_url = match form.image {
        Some(image) => Some(
            state
                .uploads()
                .upload_product_image(&caller, image)
                .await
                .or_notice("Failed to save product")?,
        ),
        None => existing.image_url,
    };

    let product = state
        .products()
        .update(&caller, id, &draft.with_image(image_url))
        .await
        .or_notice("Failed to save product")?;
    refresh_products(&state).await;

    Ok(Json(WithNotice::success(
        "Product updated successfully",
        product.into(),
    )))
}

/// Delete a product and, best effort, its stored image.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<WithNotice<DeletedView>>> {
    let caller = state.auth(&session).caller().await?;

    let existing = state
        .products()
        .get(&caller, id)
        .await
        .or_notice("Failed to delete product")?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if let Some(image_url) = existing.image_url.as_deref()
        && let Err(e) = state
            .uploads()
            .remove_product_image(&caller, image_url)
            .await
    {
        tracing::warn!(error = %e, image_url, "Failed to remove product image");
    }

    state
        .products()
        .delete(&caller, id)
        .await
        .or_notice("Failed to delete product")?;
    let product_id = id.to_string();
    add_breadcrumb("admin", "Product deleted", Some(&[("product_id", product_id.as_str())][..]));
    refresh_products(&state).await;

    Ok(Json(WithNotice::success(
        "Product deleted successfully",
        DeletedView { id },
    )))
}
