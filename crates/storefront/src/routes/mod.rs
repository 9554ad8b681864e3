//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Health check
//!
//! # Cart
//! GET    /api/cart                      - Cart snapshot
//! POST   /api/cart/items                - Add {product, quantity?}
//! PATCH  /api/cart/items/{id}           - Set quantity {quantity}
//! DELETE /api/cart/items/{id}           - Remove line
//! DELETE /api/cart                      - Clear cart
//!
//! # Checkout
//! GET    /api/checkout                  - Step, form and summary
//! PUT    /api/checkout/details          - Submit delivery form
//! POST   /api/checkout/back             - Return to delivery form
//! POST   /api/checkout/reset            - Abandon checkout
//! POST   /api/checkout/payment          - Create remote payment order
//! POST   /api/checkout/payment/approve  - Capture and place order {remoteOrderId}
//! POST   /api/checkout/payment/cancel   - Shopper cancelled payment
//! POST   /api/checkout/payment/error    - Provider reported an error
//! ```

pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::middleware::create_session_layer;
use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_quantity).delete(cart::remove_item),
        )
}

/// Create the checkout API router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/details", put(checkout::submit_details))
        .route("/back", post(checkout::back))
        .route("/reset", post(checkout::reset))
        .route("/payment", post(checkout::start_payment))
        .route("/payment/approve", post(checkout::approve))
        .route("/payment/cancel", post(checkout::cancel_payment))
        .route("/payment/error", post(checkout::payment_error))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/cart", cart_routes())
        .nest("/api/checkout", checkout_routes())
}

/// The full application: health check, API routes, sessions and request
/// tracing. Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
