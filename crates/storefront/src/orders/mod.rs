//! Order submission client.
//!
//! # Architecture
//!
//! - [`OrderApi`] is the seam the checkout controller talks to; tests inject
//!   in-process fakes, production uses [`HttpOrderClient`]
//! - Orders are created `pending` and updated once with the capture result
//! - Rejected credentials (401/403) are published as [`AuthEvent`]s instead of
//!   being handled here, so the session layer can react to them
//!
//! # Endpoints
//!
//! ```text
//! POST /api/orders               - create an order, returns {_id, ...}
//! PUT  /api/orders/{id}/payment  - record the payment capture result
//! ```

mod client;
pub mod types;

pub use client::HttpOrderClient;
pub use types::{
    ApiErrorBody, CreatedOrder, NewOrder, OrderItem, PAYMENT_METHOD_PAYPAL, PaymentStatusUpdate,
    ShippingAddress,
};

use async_trait::async_trait;
use ququ_core::OrderId;
use thiserror::Error;

/// Fallback shown when the order API gives no usable detail.
pub const GENERIC_SUBMISSION_MESSAGE: &str = "There was a problem saving your order.";

/// Errors that can occur when talking to the order API.
#[derive(Debug, Error)]
pub enum OrderError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status}{}", api_detail(.body))]
    Api {
        status: u16,
        body: Option<ApiErrorBody>,
    },

    /// A success response could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot address the endpoint.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

fn api_detail(body: &Option<ApiErrorBody>) -> String {
    body.as_ref()
        .and_then(ApiErrorBody::user_message)
        .map(|message| format!(" - {message}"))
        .unwrap_or_default()
}

impl OrderError {
    /// Message for the shopper: server message, then server field errors,
    /// then a generic fallback.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                body: Some(body), ..
            } => body
                .user_message()
                .unwrap_or_else(|| GENERIC_SUBMISSION_MESSAGE.to_string()),
            _ => GENERIC_SUBMISSION_MESSAGE.to_string(),
        }
    }

    /// HTTP status returned by the API, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Credential problems reported by the order API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The API rejected the attached token (401 or 403).
    SessionRejected { status: u16 },
}

impl AuthEvent {
    /// The event a response status implies, if any.
    #[must_use]
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::SessionRejected { status }),
            _ => None,
        }
    }
}

/// The order API as seen by checkout.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Create an order and return its id.
    async fn create_order(&self, order: &NewOrder) -> Result<CreatedOrder, OrderError>;

    /// Record the payment capture result against an existing order.
    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        update: &PaymentStatusUpdate,
    ) -> Result<(), OrderError>;
}
