//! Shopping cart state.
//!
//! [`CartStore`] owns the line items, enforces the cart invariants (one line
//! per product, quantities of at least 1), notifies observers of every change
//! and persists itself through a debounced write.

mod item;
mod notify;
mod store;

pub use item::{CartLineItem, CatalogProduct};
pub use notify::{CartObserver, Notification, NotificationKind, ToastQueue};
pub use store::{CART_KEY, CartSnapshot, CartStore, MAX_SUBTOTAL};
