//! Checkout route handlers.
//!
//! Thin wrappers over [`CheckoutController`](crate::checkout::CheckoutController).
//! The shopper's session stays locked for the whole request, including the
//! calls to the payment provider and the order API.

use axum::{Json, extract::State};
use ququ_core::RemoteOrderId;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cart::Notification;
use crate::checkout::{CheckoutError, CheckoutView, ShippingForm};
use crate::error::Result;
use crate::middleware::Shopper;
use crate::payment::{PaymentError, RemoteOrderHandle};
use crate::session::ShopperSession;
use crate::state::AppState;

/// Toast shown once an order has been placed.
pub const ORDER_PLACED_MESSAGE: &str = "Order placed successfully! Thank you for your purchase.";

/// Checkout body returned by every checkout route.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout: CheckoutView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

/// Returned after the remote payment order is created.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStartedResponse {
    pub remote_order_id: RemoteOrderId,
    pub checkout: CheckoutView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

/// Returned once the order is placed.
#[derive(Debug, Serialize)]
pub struct OrderPlacedResponse {
    /// Confirmation page to navigate to.
    pub redirect: String,
    pub checkout: CheckoutView,
    pub notifications: Vec<Notification>,
}

/// Approve request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub remote_order_id: RemoteOrderId,
}

/// Provider error report body.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentErrorReport {
    #[serde(default)]
    pub message: Option<String>,
}

fn respond(session: &ShopperSession) -> Json<CheckoutResponse> {
    Json(CheckoutResponse {
        checkout: session.checkout.view(&session.cart),
        notifications: session.drain_toasts(),
    })
}

/// Current step, form and order summary. Toasts stay queued.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
) -> Json<CheckoutResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let session = session.lock().await;

    Json(CheckoutResponse {
        checkout: session.checkout.view(&session.cart),
        notifications: Vec::new(),
    })
}

/// Submit the delivery form.
#[instrument(skip(state, form))]
pub async fn submit_details(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
    Json(form): Json<ShippingForm>,
) -> Result<Json<CheckoutResponse>> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut guard = session.lock().await;
    let session = &mut *guard;

    session.checkout.submit_details(form, &session.cart)?;
    Ok(respond(session))
}

/// Go back from payment to the delivery form.
#[instrument(skip(state))]
pub async fn back(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
) -> Result<Json<CheckoutResponse>> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    session.checkout.back_to_details()?;
    Ok(respond(&session))
}

/// Leave checkout and forget the delivery form.
#[instrument(skip(state))]
pub async fn reset(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
) -> Json<CheckoutResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    session.checkout.reset();
    respond(&session)
}

/// Register the payment with the provider.
#[instrument(skip(state))]
pub async fn start_payment(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
) -> Result<Json<PaymentStartedResponse>> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut guard = session.lock().await;
    let session = &mut *guard;

    let handle = match session
        .checkout
        .start_payment(&session.cart, state.payments())
        .await
    {
        Ok(handle) => handle,
        Err(CheckoutError::Payment(e)) => {
            session.checkout.payment_failed(&e);
            return Err(CheckoutError::Payment(e).into());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(PaymentStartedResponse {
        remote_order_id: handle.id,
        checkout: session.checkout.view(&session.cart),
        notifications: session.drain_toasts(),
    }))
}

/// Capture the approved payment and place the order.
#[instrument(skip(state, body), fields(remote_order_id = %body.remote_order_id))]
pub async fn approve(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<OrderPlacedResponse>> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut guard = session.lock().await;
    let session = &mut *guard;

    let handle = RemoteOrderHandle {
        id: body.remote_order_id,
    };
    let redirect = match session
        .checkout
        .capture_and_place(&mut session.cart, state.orders(), state.payments(), &handle)
        .await
    {
        Ok(redirect) => redirect,
        Err(CheckoutError::Payment(e)) => {
            session.checkout.payment_failed(&e);
            return Err(CheckoutError::Payment(e).into());
        }
        Err(e) => return Err(e.into()),
    };

    session.notify(Notification::success(ORDER_PLACED_MESSAGE));
    Ok(Json(OrderPlacedResponse {
        redirect,
        checkout: session.checkout.view(&session.cart),
        notifications: session.drain_toasts(),
    }))
}

/// The shopper closed the provider window.
#[instrument(skip(state))]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
) -> Json<CheckoutResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    let message = session.checkout.payment_cancelled();
    session.notify(Notification::error(message));
    respond(&session)
}

/// The provider SDK reported an error.
#[instrument(skip(state, report))]
pub async fn payment_error(
    State(state): State<AppState>,
    Shopper(shopper): Shopper,
    report: Option<Json<PaymentErrorReport>>,
) -> Json<CheckoutResponse> {
    let session = state.sessions().get_or_load(shopper).await;
    let mut session = session.lock().await;

    let detail = report
        .and_then(|Json(report)| report.message)
        .unwrap_or_else(|| "unspecified".to_string());
    let message = session
        .checkout
        .payment_failed(&PaymentError::Provider(detail));
    session.notify(Notification::error(message));
    respond(&session)
}
