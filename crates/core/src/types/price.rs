//! Money arithmetic using decimal values.
//!
//! Cart prices are currency-agnostic decimals. Rounding to two places happens
//! only at presentation boundaries (cart totals, payment amounts) and always
//! rounds half away from zero, never to even.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to two decimal places, half away from zero.
///
/// ```
/// use rust_decimal::Decimal;
/// use ququ_core::round_money;
///
/// assert_eq!(round_money(Decimal::new(1_005, 3)), Decimal::new(101, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to minor units (pence, cents), rounding first.
///
/// Returns `None` if the amount does not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    round_money(amount)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
}

/// A price with currency information, used for display and payment requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., pounds, not pence).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// The amount rounded to two decimal places.
    #[must_use]
    pub fn rounded(&self) -> Decimal {
        round_money(self.amount)
    }

    /// The amount formatted with exactly two decimals and no symbol ("24.98").
    #[must_use]
    pub fn value_string(&self) -> String {
        format!("{:.2}", self.rounded())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.currency_code.symbol(), self.value_string())
    }
}

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    GBP,
    EUR,
    USD,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GBP => "£",
            Self::EUR => "€",
            Self::USD => "$",
        }
    }

    /// Three letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::GBP => "GBP",
            Self::EUR => "EUR",
            Self::USD => "USD",
        }
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GBP" => Ok(Self::GBP),
            "EUR" => Ok(Self::EUR),
            "USD" => Ok(Self::USD),
            other => Err(format!("unsupported currency code '{other}'")),
        }
    }
}
