//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /                         - Main screen content (hero)
//! GET    /health                   - Health check
//! GET    /health/ready             - Readiness (catalog loaded)
//!
//! # Products
//! GET    /products                 - Product listing (live snapshot)
//! GET    /products/{id}            - Product detail
//!
//! # Cart (requires auth to change)
//! GET    /cart                     - Cart items, count and total
//! POST   /cart/add                 - Add a product
//! POST   /cart/update              - Increase or decrease a quantity
//! POST   /cart/remove              - Remove a product
//! GET    /cart/count               - Header badge count
//!
//! # Auth
//! POST   /auth/signup              - Create an account
//! POST   /auth/signin              - Sign in with email and password
//! POST   /auth/signout             - Sign out
//! GET    /auth/session             - Current identity and cart count
//!
//! # Admin (requires admin)
//! GET    /admin/products           - Product list, fresh from the store
//! POST   /admin/products           - Create (multipart)
//! POST   /admin/products/{id}      - Update (multipart)
//! DELETE /admin/products/{id}      - Delete with its image
//! GET    /admin/main-content       - Load main screen content
//! POST   /admin/main-content       - Save main screen content (multipart)
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod home;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::sign_up))
        .route("/signin", post(auth::sign_in))
        .route("/signout", post(auth::sign_out))
        .route("/session", get(auth::current_session))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin::routes())
}
