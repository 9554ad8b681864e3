//! Two-stage checkout: delivery details, then payment.
//!
//! # State machine
//!
//! ```text
//! CollectingDetails --submit_details--> AwaitingPayment --approve_payment--> Confirmed
//!         ^                                |     ^                  |
//!         +------ back_to_details ---------+     +---- failure -----+
//! ```
//!
//! The order is created only after the payment provider approves the
//! payment, never at checkout start, so no order exists for a payment the
//! shopper never completed.

mod controller;
mod error;
mod form;
mod summary;

pub use controller::{
    CART_CHANGED_MESSAGE, CheckoutController, CheckoutView, UNKNOWN_PAYMENT_MESSAGE,
    confirmation_path,
};
pub use error::CheckoutError;
pub use form::{COUNTRIES, Country, FieldError, ShippingForm, UK_COUNTIES, ValidatedShipping};
pub use summary::OrderSummary;

use core::fmt;
use core::str::FromStr;

use ququ_core::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which checkout flow the storefront runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutRegion {
    /// UK-only delivery: country fixed to GB, county list, postcode pattern.
    #[default]
    Uk,
    /// Delivery to any listed country, free-text region and postcode.
    International,
}

impl fmt::Display for CheckoutRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uk => f.write_str("uk"),
            Self::International => f.write_str("international"),
        }
    }
}

impl FromStr for CheckoutRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uk" | "gb" => Ok(Self::Uk),
            "international" | "intl" => Ok(Self::International),
            other => Err(format!("unknown checkout region '{other}'")),
        }
    }
}

/// Knobs that shape every checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub region: CheckoutRegion,
    pub currency: CurrencyCode,
    /// Flat charge for express delivery.
    pub express_surcharge: Decimal,
    /// Shown on the payment provider's pages.
    pub brand_name: String,
}

impl CheckoutSettings {
    pub const DEFAULT_BRAND_NAME: &'static str = "QUQU LONDON";

    /// £4.99
    #[must_use]
    pub const fn default_express_surcharge() -> Decimal {
        Decimal::from_parts(499, 0, 0, false, 2)
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            region: CheckoutRegion::default(),
            currency: CurrencyCode::default(),
            express_surcharge: Self::default_express_surcharge(),
            brand_name: Self::DEFAULT_BRAND_NAME.to_string(),
        }
    }
}
