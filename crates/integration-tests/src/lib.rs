//! Integration tests for the QUQU storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ququ-integration-tests
//! ```
//!
//! The storefront router runs in-process (`tower::ServiceExt::oneshot`) with
//! in-memory cart storage and fake order and payment collaborators, so no
//! external services are needed.
//!
//! # Test Categories
//!
//! - `cart_api` - Cart JSON API
//! - `checkout_flow` - Delivery details through to a placed order
//! - `order_client` - HTTP order client against a local fake order API

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use ququ_core::{OrderId, RemoteOrderId};
use ququ_storefront::checkout::{CheckoutRegion, CheckoutSettings};
use ququ_storefront::config::{CartConfig, OrderApiConfig, PayPalConfig, StorefrontConfig};
use ququ_storefront::orders::{
    ApiErrorBody, CreatedOrder, NewOrder, OrderApi, OrderError, PaymentStatusUpdate,
};
use ququ_storefront::payment::{
    CaptureResult, PaymentCapture, PaymentError, RemoteOrderHandle, RemoteOrderRequest,
};
use ququ_storefront::persist::MemoryStore;
use ququ_storefront::routes;
use ququ_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

/// Remote order id handed out by [`FakePayments`].
pub const REMOTE_ORDER_ID: &str = "PAYPAL-ORDER-1";

/// Capture id returned by [`FakePayments`].
pub const CAPTURE_ID: &str = "CAPTURE-1";

/// Configuration pointing at nothing; collaborators are injected.
#[must_use]
pub fn test_config(region: CheckoutRegion) -> StorefrontConfig {
    StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: Url::parse("http://localhost:3000").expect("valid url"),
        order_api: OrderApiConfig {
            base_url: Url::parse("http://localhost:5000").expect("valid url"),
            token: None,
            timeout: Duration::from_secs(5),
        },
        paypal: PayPalConfig {
            client_id: "test-client".to_string(),
            client_secret: SecretString::from("unused"),
            api_base: Url::parse("http://localhost:9").expect("valid url"),
        },
        checkout: CheckoutSettings {
            region,
            ..CheckoutSettings::default()
        },
        cart: CartConfig {
            debounce: Duration::from_millis(300),
            storage_dir: PathBuf::from("unused"),
        },
        session_idle: Duration::from_secs(30 * 60),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

// =============================================================================
// Fakes
// =============================================================================

/// Order API that records every call.
#[derive(Default)]
pub struct FakeOrders {
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<NewOrder>>,
    /// Number of upcoming creates that fail with a 400.
    pub fail_creates: AtomicUsize,
}

impl FakeOrders {
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    #[must_use]
    pub fn created(&self) -> Vec<NewOrder> {
        self.created.lock().expect("lock").clone()
    }
}

#[async_trait]
impl OrderApi for FakeOrders {
    async fn create_order(&self, order: &NewOrder) -> Result<CreatedOrder, OrderError> {
        self.calls.lock().expect("lock").push("create".to_string());
        if self.fail_creates.load(Ordering::SeqCst) > 0 {
            self.fail_creates.fetch_sub(1, Ordering::SeqCst);
            return Err(OrderError::Api {
                status: 400,
                body: Some(ApiErrorBody {
                    message: Some("Order validation failed".to_string()),
                    errors: None,
                }),
            });
        }

        let mut created = self.created.lock().expect("lock");
        created.push(order.clone());
        Ok(CreatedOrder {
            id: OrderId::new(format!("order-{}", created.len())),
        })
    }

    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        update: &PaymentStatusUpdate,
    ) -> Result<(), OrderError> {
        self.calls.lock().expect("lock").push(format!(
            "update {order_id} {} {}",
            update.payment_id, update.status
        ));
        Ok(())
    }
}

/// Payment provider that approves everything unless told to decline.
#[derive(Default)]
pub struct FakePayments {
    pub requests: Mutex<Vec<RemoteOrderRequest>>,
    pub captures: AtomicUsize,
    pub decline: AtomicBool,
}

impl FakePayments {
    #[must_use]
    pub fn requests(&self) -> Vec<RemoteOrderRequest> {
        self.requests.lock().expect("lock").clone()
    }

    #[must_use]
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentCapture for FakePayments {
    async fn create_remote_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> Result<RemoteOrderHandle, PaymentError> {
        self.requests.lock().expect("lock").push(request.clone());
        Ok(RemoteOrderHandle {
            id: RemoteOrderId::new(REMOTE_ORDER_ID),
        })
    }

    async fn capture_approved(
        &self,
        _handle: &RemoteOrderHandle,
    ) -> Result<CaptureResult, PaymentError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.decline.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 422,
                message: "INSTRUMENT_DECLINED".to_string(),
            });
        }
        Ok(CaptureResult {
            id: CAPTURE_ID.to_string(),
            status: "COMPLETED".to_string(),
        })
    }
}

// =============================================================================
// TestApp
// =============================================================================

/// The storefront router plus handles on its fakes.
pub struct TestApp {
    router: Router,
    pub storage: Arc<MemoryStore>,
    pub orders: Arc<FakeOrders>,
    pub payments: Arc<FakePayments>,
}

impl TestApp {
    #[must_use]
    pub fn new(region: CheckoutRegion) -> Self {
        let storage = Arc::new(MemoryStore::new());
        let orders = Arc::new(FakeOrders::default());
        let payments = Arc::new(FakePayments::default());
        let state = AppState::with_parts(
            test_config(region),
            storage.clone(),
            orders.clone(),
            payments.clone(),
        );

        Self {
            router: routes::app(state),
            storage,
            orders,
            payments,
        }
    }

    /// A new shopper with their own session cookie.
    #[must_use]
    pub fn shopper(&self) -> TestShopper {
        TestShopper {
            router: self.router.clone(),
            cookie: None,
        }
    }
}

/// One browser: carries the session cookie between requests.
pub struct TestShopper {
    router: Router,
    cookie: Option<String>,
}

impl TestShopper {
    /// Send a request and return the status and JSON body (`Null` for
    /// non-JSON bodies).
    ///
    /// # Panics
    ///
    /// Panics if the router fails, which it never does for axum routers.
    pub async fn send(
        &mut self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, body).await
    }
}

/// Messages of the `notifications` array in a response body.
#[must_use]
pub fn notification_messages(body: &Value) -> Vec<String> {
    body["notifications"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|n| n["message"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

/// A decimal from a JSON string or number.
#[must_use]
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.parse().expect("decimal")
}
