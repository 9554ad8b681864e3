//! Cart route handlers.
//!
//! Carts are keyed by the anonymous shopper id held in the session. Every
//! mutation answers with the new cart and the toasts it produced.

use axum::{
    Json,
    extract::{Path, State},
};
use ququ_core::ProductId;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cart::{CartSnapshot, CatalogProduct, Notification};
use crate::middleware::Shopper;
use crate::state::AppState;

/// Cart body returned by every cart route.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: CartSnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product: CatalogProduct,
    /// Defaults to 1.
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Set quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Negative quantities from clients count as zero.
fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity.max(0)).unwrap_or(u32::MAX)
}

/// Current cart. Toasts stay queued.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Shopper(shopper): Shopper) -> Json<CartResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let session = session.lock().await;

    Json(CartResponse {
        cart: session.cart.snapshot(),
        notifications: Vec::new(),
    })
}

/// Add a product to the cart.
#[instrument(skip(state, body), fields(product_id = ?body.product.id, quantity = ?body.quantity))]
pub async fn add_item(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
    Json(body): Json<AddItemRequest>,
) -> Json<CartResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    let quantity = body.quantity.map_or(1, clamp_quantity);
    session.cart.add_item(&body.product, quantity);

    Json(CartResponse {
        cart: session.cart.snapshot(),
        notifications: session.drain_toasts(),
    })
}

/// Set the quantity of a line. Zero or less removes it.
#[instrument(skip(state, body), fields(quantity = body.quantity))]
pub async fn update_quantity(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Json<CartResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    session
        .cart
        .update_quantity(&product_id, clamp_quantity(body.quantity));

    Json(CartResponse {
        cart: session.cart.snapshot(),
        notifications: session.drain_toasts(),
    })
}

/// Remove a line from the cart.
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
    Path(product_id): Path<ProductId>,
) -> Json<CartResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    session.cart.remove_item(&product_id);

    Json(CartResponse {
        cart: session.cart.snapshot(),
        notifications: session.drain_toasts(),
    })
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(State(state): State<AppState>, Shopper(shopper): Shopper) -> Json<CartResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    session.cart.clear();

    Json(CartResponse {
        cart: session.cart.snapshot(),
        notifications: session.drain_toasts(),
    })
}
