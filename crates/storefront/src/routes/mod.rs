//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//!
//! # Products
//! GET  /products               - Product listing (?category=slug)
//! GET  /products/{id}          - Product detail with variant options
//!
//! # Cart (login required except add, which redirects to login)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add one unit of a variant
//! POST /cart/update            - Set quantity (< 1 ignored)
//! POST /cart/remove            - Remove line
//!
//! # Checkout (login required)
//! GET  /checkout               - Shipping form + summary
//! POST /checkout               - Create order, open payment widget
//! POST /checkout/verify        - Widget success callback
//! POST /checkout/cancel        - Widget dismissed
//!
//! # Account (login required)
//! GET  /account                - Profile + order history
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//! ```
//!
//! Form posts on `/auth` are limited by [`auth_rate_limiter`]; everything
//! under `/cart` and `/checkout` by [`checkout_rate_limiter`].

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod layout;
pub mod products;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter, push_flash};
use crate::models::Flash;
use crate::state::AppState;

/// Queue a flash message and redirect.
///
/// A session failure only loses the message; the redirect still happens.
pub async fn flash_redirect(session: &Session, flash: Flash, to: &str) -> Response {
    if let Err(e) = push_flash(session, flash).await {
        tracing::warn!(error = %e, "Failed to queue flash message");
    }
    Redirect::to(to).into_response()
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(auth_rate_limiter())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(auth_rate_limiter())),
        )
        .route("/logout", post(auth::logout))
}

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
        .route_layer(checkout_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::begin))
        .route("/verify", post(checkout::verify))
        .route("/cancel", post(checkout::cancel))
        .route_layer(checkout_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/account", get(account::index))
        .nest("/auth", auth_routes())
}
