//! Status and option enums shared by the cart, checkout and order client.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::OrderId;

/// Payment status recorded on an order.
///
/// Orders are created `pending` and updated once after the payment provider
/// reports the capture result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Declined,
    Failed,
}

impl PaymentStatus {
    /// Wire value used by the order API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Failed => "failed",
        }
    }

    /// Lowercased, trimmed form of a provider status ("COMPLETED" -> "completed").
    #[must_use]
    pub fn normalize_provider(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Map a provider capture status onto a known status, if recognised.
    #[must_use]
    pub fn from_provider(raw: &str) -> Option<Self> {
        match Self::normalize_provider(raw).as_str() {
            "pending" | "created" | "approved" | "saved" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "declined" | "voided" => Some(Self::Declined),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery speed chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOption {
    /// Free, 3-5 working days.
    #[default]
    Standard,
    /// Fixed surcharge, next working day.
    Express,
}

impl DeliveryOption {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
        }
    }

    /// Human readable delivery estimate.
    #[must_use]
    pub const fn estimate(self) -> &'static str {
        match self {
            Self::Standard => "3-5 working days",
            Self::Express => "Next working day",
        }
    }

    #[must_use]
    pub const fn is_express(self) -> bool {
        matches!(self, Self::Express)
    }
}

impl FromStr for DeliveryOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            other => Err(format!("unknown delivery option '{other}'")),
        }
    }
}

/// Where a shopper is in the checkout.
///
/// ```text
/// CollectingDetails -> AwaitingPayment -> Confirmed
///         ^                  |    ^   |
///         +------ back ------+    +---+ payment or submission failure
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum CheckoutStep {
    #[default]
    CollectingDetails,
    AwaitingPayment,
    #[serde(rename_all = "camelCase")]
    Confirmed { order_id: OrderId },
}

impl CheckoutStep {
    /// 1-based step number shown in the progress indicator.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::CollectingDetails => 1,
            Self::AwaitingPayment => 2,
            Self::Confirmed { .. } => 3,
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::CollectingDetails => "Delivery Details",
            Self::AwaitingPayment => "Payment",
            Self::Confirmed { .. } => "Confirmation",
        }
    }

    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}
