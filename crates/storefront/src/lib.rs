//! QUQU storefront cart and checkout service.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod payment;
pub mod persist;
pub mod routes;
pub mod session;
pub mod state;
