//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin),
//! so anonymous callers get 401 and signed-in non-admins get 403. Backend
//! calls are made with the admin's own access token.

pub mod form;
pub mod main_content;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            post(products::update).delete(products::delete),
        )
        .route(
            "/main-content",
            get(main_content::show).post(main_content::save),
        )
}

/// Bring the live product snapshot up to date after an admin write.
///
/// The write already succeeded, so a failed reload is only logged; the
/// change feed catches the snapshot up later.
async fn refresh_products(state: &AppState) {
    if let Err(e) = state.catalog().reload_products(state.tables()).await {
        tracing::warn!(error = %e, "Failed to refresh product snapshot");
    }
}

async fn refresh_main_content(state: &AppState) {
    if let Err(e) = state.catalog().reload_main_content(state.tables()).await {
        tracing::warn!(error = %e, "Failed to refresh main content snapshot");
    }
}
