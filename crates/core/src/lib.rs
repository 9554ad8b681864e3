//! QUQU Core - Shared types library.
//!
//! This crate provides the domain types used by the storefront:
//! - product and order identifiers
//! - money arithmetic with the rounding rules used at checkout
//! - validated contact data (email addresses, UK postcodes)
//! - payment and delivery enums shared by the cart, checkout and order client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no persistence. This keeps it usable from tests and tools alike.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, postcodes and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
