//! Order totals shown beside the checkout form.

use ququ_core::{CurrencyCode, DeliveryOption, Price, round_money};
use rust_decimal::Decimal;
use serde::Serialize;

/// Subtotal, delivery charge and total.
///
/// Amounts are kept unrounded; [`OrderSummary::total`] rounds once for
/// presentation and for the amount charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub delivery_option: DeliveryOption,
    pub currency: CurrencyCode,
    #[serde(rename = "total")]
    total_rounded: Decimal,
}

impl OrderSummary {
    #[must_use]
    pub fn new(
        subtotal: Decimal,
        delivery_option: DeliveryOption,
        express_surcharge: Decimal,
        currency: CurrencyCode,
    ) -> Self {
        let shipping = if delivery_option.is_express() {
            express_surcharge
        } else {
            Decimal::ZERO
        };
        Self {
            subtotal,
            shipping,
            delivery_option,
            currency,
            total_rounded: round_money(subtotal + shipping),
        }
    }

    /// `subtotal + shipping`, rounded to two places.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total_rounded
    }

    #[must_use]
    pub const fn total_price(&self) -> Price {
        Price::new(self.total_rounded, self.currency)
    }
}
