use thiserror::Error;

use super::FieldError;
use crate::orders::OrderError;
use crate::payment::PaymentError;

/// Banner shown above an invalid delivery form.
pub const VALIDATION_MESSAGE: &str = "Please fill in all delivery information with valid details. UK postcode format required (e.g., SW1A 1AA).";

/// Banner shown when the delivery form is invalid on the international flow.
pub const INTERNATIONAL_VALIDATION_MESSAGE: &str =
    "Please fill in all delivery information with valid details.";

/// Banner shown when checkout is attempted with nothing in the cart.
pub const EMPTY_CART_MESSAGE: &str =
    "Your cart is empty. Please add items before proceeding to payment.";

/// Errors surfaced by the checkout controller.
///
/// Every variant carries a message fit for the shopper; the controller never
/// lets a remote failure escape unconverted.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The delivery form has invalid fields.
    #[error("Invalid delivery details")]
    Validation {
        message: &'static str,
        fields: Vec<FieldError>,
    },

    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The operation is not valid in the current checkout step.
    #[error("Checkout step mismatch: {0}")]
    WrongStep(&'static str),

    /// Creating the order or recording its payment failed.
    #[error("Order submission failed: {source}")]
    Submission {
        message: String,
        #[source]
        source: OrderError,
    },

    /// The payment provider failed or the shopper cancelled.
    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),
}

impl CheckoutError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } | Self::WrongStep(message) => (*message).to_string(),
            Self::EmptyCart => EMPTY_CART_MESSAGE.to_string(),
            Self::Submission { message, .. } => message.clone(),
            Self::Payment(err) => err.user_message().to_string(),
        }
    }

    pub(crate) fn submission(source: OrderError) -> Self {
        Self::Submission {
            message: source.user_message(),
            source,
        }
    }
}
