//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with in-memory store)

pub mod session;

pub use session::{SESSION_COOKIE_NAME, Shopper, create_session_layer, shopper_id};
