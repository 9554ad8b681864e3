//! Payment capture collaborator.
//!
//! Checkout only consumes the capture result. The payment protocol itself
//! lives behind [`PaymentCapture`]; production uses [`PayPalClient`].
//!
//! # Flow
//!
//! 1. `create_remote_order` registers the amount and shipping address with
//!    the provider and returns a handle the shopper approves in the provider UI
//! 2. `capture_approved` finalizes the approved payment and returns the
//!    capture id and status that are recorded on the order

mod paypal;

pub use paypal::PayPalClient;

use async_trait::async_trait;
use ququ_core::{CurrencyCode, RemoteOrderId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Shown for any provider failure other than a cancellation.
pub const PAYMENT_FAILED_MESSAGE: &str = "Payment failed. Please try again.";

/// Shown when the shopper closes the provider window.
pub const PAYMENT_CANCELLED_MESSAGE: &str = "Payment cancelled";

/// Errors raised by the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The shopper cancelled in the provider UI.
    #[error("Payment cancelled by shopper")]
    Cancelled,

    /// The provider refused the request.
    #[error("Payment provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything else the provider reported, including malformed responses.
    #[error("Payment provider error: {0}")]
    Provider(String),
}

impl PaymentError {
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Cancelled => PAYMENT_CANCELLED_MESSAGE,
            _ => PAYMENT_FAILED_MESSAGE,
        }
    }
}

/// Delivery address passed to the provider so the shopper cannot change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingSnapshot {
    pub full_name: String,
    pub address_line: String,
    pub city: String,
    /// County or state.
    pub region: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub country_code: String,
}

/// What checkout asks the provider to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrderRequest {
    pub amount_minor_units: i64,
    pub currency: CurrencyCode,
    pub brand_name: String,
    pub shipping: ShippingSnapshot,
}

impl RemoteOrderRequest {
    /// Amount in the currency's standard unit.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.amount_minor_units, 2)
    }

    /// Amount as the provider expects it: two decimals, no symbol.
    #[must_use]
    pub fn amount_value(&self) -> String {
        format!("{:.2}", self.amount())
    }
}

/// Reference to an order registered with the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrderHandle {
    pub id: RemoteOrderId,
}

/// Outcome of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    /// Provider identifier recorded as the order's payment id.
    pub id: String,
    /// Raw provider status (`COMPLETED`).
    pub status: String,
}

/// The payment provider as seen by checkout.
#[async_trait]
pub trait PaymentCapture: Send + Sync {
    /// Register an order with the provider for the shopper to approve.
    async fn create_remote_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> Result<RemoteOrderHandle, PaymentError>;

    /// Capture a payment the shopper has approved.
    async fn capture_approved(
        &self,
        handle: &RemoteOrderHandle,
    ) -> Result<CaptureResult, PaymentError>;
}
