//! Integration tests for the HTTP order client against a local fake order API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{post, put};
use axum::{Json, Router};
use ququ_core::{DeliveryOption, OrderId, PaymentStatus};
use ququ_storefront::config::OrderApiConfig;
use ququ_storefront::orders::{
    AuthEvent, HttpOrderClient, NewOrder, OrderApi, OrderError, OrderItem, PaymentStatusUpdate,
    ShippingAddress,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

type Received = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

async fn spawn(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

fn client(base_url: Url, token: Option<&str>) -> HttpOrderClient {
    HttpOrderClient::new(&OrderApiConfig {
        base_url,
        token: token.map(SecretString::from),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn order() -> NewOrder {
    NewOrder {
        items: vec![OrderItem {
            name: "Silk Scarf".to_string(),
            price: "12.49".parse().unwrap(),
            quantity: 2,
            image: "/img/scarf.jpg".to_string(),
        }],
        shipping_cost: Decimal::ZERO,
        total_amount: "24.98".parse().unwrap(),
        shipping_address: ShippingAddress {
            name: "Jo Bloggs".to_string(),
            email: "jo@example.com".to_string(),
            phone: "07700 900123".to_string(),
            street: "1 High Street".to_string(),
            city: "London".to_string(),
            state: "Greater London".to_string(),
            postcode: "SW1A 1AA".to_string(),
            country: "GB".to_string(),
        },
        payment_method: "PayPal".to_string(),
        payment_id: "CAPTURE-1".to_string(),
        payment_status: PaymentStatus::Pending,
        delivery_option: DeliveryOption::Standard,
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn create(
    State(received): State<Received>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    received
        .lock()
        .unwrap()
        .push(("create".to_string(), bearer(&headers), body));
    Json(json!({ "_id": "64f1c0ffee", "paymentStatus": "pending" }))
}

async fn record_payment(
    State(received): State<Received>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    received
        .lock()
        .unwrap()
        .push((format!("payment {id}"), bearer(&headers), body));
    StatusCode::NO_CONTENT
}

#[tokio::test]
async fn test_create_and_record_payment() {
    let received = Received::default();
    let router = Router::new()
        .route("/api/orders", post(create))
        .route("/api/orders/{id}/payment", put(record_payment))
        .with_state(received.clone());
    let orders = client(spawn(router).await, Some("order-api-token"));

    let created = orders.create_order(&order()).await.unwrap();
    assert_eq!(created.id, OrderId::new("64f1c0ffee"));

    orders
        .update_payment_status(
            &created.id,
            &PaymentStatusUpdate {
                payment_id: "CAPTURE-1".to_string(),
                status: "completed".to_string(),
            },
        )
        .await
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);

    let (name, auth, body) = &received[0];
    assert_eq!(name, "create");
    assert_eq!(auth.as_deref(), Some("Bearer order-api-token"));
    assert_eq!(body["paymentStatus"], "pending");
    assert_eq!(body["paymentMethod"], "PayPal");
    assert_eq!(body["deliveryOption"], "standard");
    assert!((body["totalAmount"].as_f64().unwrap() - 24.98).abs() < 1e-9);
    assert!((body["items"][0]["price"].as_f64().unwrap() - 12.49).abs() < 1e-9);
    assert_eq!(body["shippingAddress"]["postcode"], "SW1A 1AA");

    let (name, _, body) = &received[1];
    assert_eq!(name, "payment 64f1c0ffee");
    assert_eq!(body, &json!({ "paymentId": "CAPTURE-1", "status": "completed" }));
}

#[tokio::test]
async fn test_rejected_token_publishes_auth_event() {
    let router = Router::new().route(
        "/api/orders",
        post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Token expired" }))) }),
    );
    let orders = client(spawn(router).await, Some("stale-token"));
    let mut events = orders.subscribe_auth_events();

    let err = orders.create_order(&order()).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.user_message(), "Token expired");

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, AuthEvent::SessionRejected { status: 401 });
}

#[tokio::test]
async fn test_validation_errors_become_user_message() {
    let router = Router::new().route(
        "/api/orders",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Order validation failed:",
                    "errors": { "shippingAddress.email": { "message": "Email is invalid" } }
                })),
            )
        }),
    );
    let orders = client(spawn(router).await, None);
    let mut events = orders.subscribe_auth_events();

    let err = orders.create_order(&order()).await.unwrap_err();
    assert!(matches!(err, OrderError::Api { status: 400, .. }));
    assert_eq!(
        err.user_message(),
        "Order validation failed: Email is invalid"
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_undecodable_success_response() {
    let router = Router::new().route("/api/orders", post(|| async { "created" }));
    let orders = client(spawn(router).await, None);

    let err = orders.create_order(&order()).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidResponse(_)));
    assert_eq!(err.user_message(), "There was a problem saving your order.");
}
