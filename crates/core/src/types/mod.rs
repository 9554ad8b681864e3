//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod postcode;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use postcode::{PostcodeError, UkPostcode, normalize_uk_postcode};
pub use price::{CurrencyCode, Price, round_money, to_minor_units};
pub use status::*;
