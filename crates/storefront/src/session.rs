//! Per-shopper cart and checkout state.
//!
//! Each shopper owns one [`ShopperSession`] behind a `tokio::sync::Mutex`, so
//! requests for the same shopper are applied one at a time in arrival order.
//! Sessions are kept in a `moka` cache and evicted after a period of
//! inactivity; the cart is flushed to storage on eviction and reloaded from
//! storage on the next request.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cart::{CartStore, Notification, ToastQueue};
use crate::checkout::{CheckoutController, CheckoutSettings};
use crate::persist::KeyValueStore;

/// Storage key of a shopper's cart.
#[must_use]
pub fn cart_key(shopper: Uuid) -> String {
    format!("shopper/{shopper}/cart")
}

/// A shopper's cart, checkout and pending toasts.
#[derive(Debug)]
pub struct ShopperSession {
    pub cart: CartStore,
    pub checkout: CheckoutController,
    toasts: Arc<ToastQueue>,
}

impl ShopperSession {
    /// Hydrate the cart from storage and start a fresh checkout.
    #[must_use]
    pub fn load(
        storage: Arc<dyn KeyValueStore>,
        key: &str,
        debounce: Duration,
        settings: CheckoutSettings,
    ) -> Self {
        let toasts = Arc::new(ToastQueue::default());
        let mut cart = CartStore::load(storage, key, debounce);
        cart.subscribe(toasts.clone());
        Self {
            cart,
            checkout: CheckoutController::new(settings),
            toasts,
        }
    }

    /// Queue a toast that did not come from the cart.
    pub fn notify(&self, notification: Notification) {
        self.toasts.push(notification);
    }

    /// Take every pending toast.
    pub fn drain_toasts(&self) -> Vec<Notification> {
        self.toasts.drain()
    }
}

pub type SharedSession = Arc<Mutex<ShopperSession>>;

/// Live shopper sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<Uuid, SharedSession>,
    storage: Arc<dyn KeyValueStore>,
    settings: CheckoutSettings,
    debounce: Duration,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        settings: CheckoutSettings,
        debounce: Duration,
        idle: Duration,
    ) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(idle)
            .eviction_listener(|shopper: Arc<Uuid>, session: SharedSession, cause| {
                if cause == RemovalCause::Replaced {
                    return;
                }
                // A session still locked is mid-request; its debounced write
                // is already scheduled.
                match session.try_lock() {
                    Ok(mut session) => {
                        // The write carries on in the background.
                        drop(session.cart.flush());
                        debug!(shopper = %shopper, ?cause, "Session evicted, cart flushed");
                    }
                    Err(_) => warn!(shopper = %shopper, "Session evicted while in use"),
                }
            })
            .build();

        Self {
            sessions,
            storage,
            settings,
            debounce,
        }
    }

    /// The shopper's session, loading the cart from storage on first use.
    ///
    /// The storage read runs on the blocking pool.
    pub async fn get_or_load(&self, shopper: Uuid) -> SharedSession {
        self.sessions
            .get_with(shopper, async {
                debug!(shopper = %shopper, "Loading shopper session");
                let storage = Arc::clone(&self.storage);
                let debounce = self.debounce;
                let settings = self.settings.clone();
                let loaded = tokio::task::spawn_blocking(move || {
                    ShopperSession::load(storage, &cart_key(shopper), debounce, settings)
                })
                .await;
                match loaded {
                    Ok(session) => Arc::new(Mutex::new(session)),
                    Err(e) => std::panic::resume_unwind(e.into_panic()),
                }
            })
            .await
    }

    /// Write every live cart to storage now and wait for the writes. Called on
    /// shutdown.
    pub async fn flush_all(&self) {
        let sessions: Vec<SharedSession> = self.sessions.iter().map(|(_, s)| s).collect();
        for session in &sessions {
            let write = session.lock().await.cart.flush();
            if let Some(write) = write
                && let Err(e) = write.await
            {
                warn!(error = %e, "Cart flush failed");
            }
        }
        info!(sessions = sessions.len(), "Flushed shopper carts");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ququ_core::ProductId;
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::CatalogProduct;
    use crate::persist::MemoryStore;

    fn registry(storage: Arc<MemoryStore>) -> SessionRegistry {
        SessionRegistry::new(
            storage,
            CheckoutSettings::default(),
            Duration::from_millis(300),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_cart_key_is_namespaced() {
        let shopper = Uuid::nil();
        assert_eq!(
            cart_key(shopper),
            "shopper/00000000-0000-0000-0000-000000000000/cart"
        );
    }

    #[tokio::test]
    async fn test_same_shopper_shares_session() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let shopper = Uuid::new_v4();

        let first = registry.get_or_load(shopper).await;
        first
            .lock()
            .await
            .cart
            .add_item(&CatalogProduct::new("p1", "Tote", Decimal::TEN), 1);

        let second = registry.get_or_load(shopper).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.cart.count(), 1);

        let other = registry.get_or_load(Uuid::new_v4()).await;
        assert!(other.lock().await.cart.is_empty());
    }

    #[tokio::test]
    async fn test_toasts_collect_cart_notifications() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let session = registry.get_or_load(Uuid::new_v4()).await;
        let mut session = session.lock().await;

        session
            .cart
            .add_item(&CatalogProduct::new("p1", "Tote", Decimal::TEN), 1);
        session.cart.remove_item(&ProductId::new("p1"));
        session.notify(Notification::success("Order placed"));

        let messages: Vec<_> = session
            .drain_toasts()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, ["Added Tote", "Removed Tote", "Order placed"]);
        assert!(session.drain_toasts().is_empty());
    }

    #[tokio::test]
    async fn test_flush_all_persists_carts() {
        let storage = Arc::new(MemoryStore::new());
        let registry = registry(storage.clone());
        let shopper = Uuid::new_v4();

        registry
            .get_or_load(shopper)
            .await
            .lock()
            .await
            .cart
            .add_item(&CatalogProduct::new("p1", "Tote", Decimal::TEN), 2);
        registry.flush_all().await;

        let stored = storage.get(&cart_key(shopper)).unwrap().unwrap();
        assert!(stored.contains("\"quantity\":2"));
    }
}
