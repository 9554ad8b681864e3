//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::orders::{HttpOrderClient, OrderApi, OrderError};
use crate::payment::{PayPalClient, PaymentCapture, PaymentError};
use crate::persist::{FileStore, KeyValueStore};
use crate::session::SessionRegistry;

/// Error building the production collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("order client: {0}")]
    Orders(#[from] OrderError),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// shopper sessions and the remote collaborators.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    sessions: SessionRegistry,
    orders: Arc<dyn OrderApi>,
    payments: Arc<dyn PaymentCapture>,
}

impl AppState {
    /// Create the production state: carts on disk, the HTTP order client and
    /// PayPal.
    ///
    /// Also returns the order client so the caller can subscribe to its auth
    /// events.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<(Self, HttpOrderClient), StateError> {
        let orders = HttpOrderClient::new(&config.order_api)?;
        let payments = PayPalClient::new(&config.paypal, &config.base_url)?;
        let storage = Arc::new(FileStore::new(config.cart.storage_dir.clone()));

        let state = Self::with_parts(config, storage, Arc::new(orders.clone()), Arc::new(payments));
        Ok((state, orders))
    }

    /// Assemble state from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        storage: Arc<dyn KeyValueStore>,
        orders: Arc<dyn OrderApi>,
        payments: Arc<dyn PaymentCapture>,
    ) -> Self {
        let sessions = SessionRegistry::new(
            storage,
            config.checkout.clone(),
            config.cart.debounce,
            config.session_idle,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                orders,
                payments,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Live shopper sessions.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderApi {
        self.inner.orders.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentCapture {
        self.inner.payments.as_ref()
    }
}
