//! Integration tests for the cart API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::{Method, StatusCode};
use ququ_core::CurrencyCode;
use ququ_integration_tests::{TestApp, decimal, notification_messages};
use ququ_storefront::checkout::CheckoutRegion;
use rust_decimal::Decimal;
use serde_json::{Value, json};

fn product(id: &str, name: &str, price: &str) -> Value {
    json!({ "id": id, "name": name, "price": price, "image": format!("/img/{id}.jpg") })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let (status, _) = app.shopper().get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_new_shopper_has_empty_cart() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let (status, body) = app.shopper().get("/api/cart").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["items"], json!([]));
    assert_eq!(body["cart"]["count"], 0);
    assert_eq!(decimal(&body["cart"]["total"]), Decimal::ZERO);
    assert!(body.get("notifications").is_none());
}

#[tokio::test]
async fn test_add_merges_lines_for_same_product() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let mut shopper = app.shopper();

    let (status, body) = shopper
        .post(
            "/api/cart/items",
            Some(json!({ "product": product("scarf", "Silk Scarf", "19.99") })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(notification_messages(&body), ["Added Silk Scarf"]);

    let (_, body) = shopper
        .post(
            "/api/cart/items",
            Some(json!({ "product": product("scarf", "Silk Scarf", "19.99"), "quantity": 2 })),
        )
        .await;
    assert_eq!(notification_messages(&body), ["+2 Silk Scarf"]);

    let items = body["cart"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(items[0]["image"], "/img/scarf.jpg");
    assert_eq!(body["cart"]["count"], 3);
    assert_eq!(
        decimal(&body["cart"]["total"]),
        "59.97".parse::<Decimal>().unwrap()
    );
}

#[tokio::test]
async fn test_invalid_adds_are_ignored() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let mut shopper = app.shopper();

    let (_, body) = shopper
        .post(
            "/api/cart/items",
            Some(json!({ "product": product("tote", "Tote", "12.00"), "quantity": -3 })),
        )
        .await;
    assert_eq!(body["cart"]["count"], 0);

    let (_, body) = shopper
        .post(
            "/api/cart/items",
            Some(json!({ "product": { "name": "Mystery", "price": "5.00" } })),
        )
        .await;
    assert_eq!(body["cart"]["count"], 0);
    assert!(notification_messages(&body).is_empty());
}

#[tokio::test]
async fn test_update_remove_and_clear() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let mut shopper = app.shopper();

    for (id, name) in [("a", "Scarf"), ("b", "Tote"), ("c", "Pin")] {
        shopper
            .post(
                "/api/cart/items",
                Some(json!({ "product": product(id, name, "10.00") })),
            )
            .await;
    }

    let (_, body) = shopper
        .send(
            Method::PATCH,
            "/api/cart/items/a",
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(notification_messages(&body), ["Updated Scarf"]);
    assert_eq!(body["cart"]["count"], 6);

    // Zero removes the line
    let (_, body) = shopper
        .send(
            Method::PATCH,
            "/api/cart/items/b",
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(notification_messages(&body), ["Removed Tote"]);

    let (_, body) = shopper
        .send(Method::DELETE, "/api/cart/items/c", None)
        .await;
    assert_eq!(notification_messages(&body), ["Removed Pin"]);
    let ids: Vec<&str> = body["cart"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["id"].as_str())
        .collect();
    assert_eq!(ids, ["a"]);

    // Unknown ids are a no-op
    let (status, body) = shopper
        .send(Method::DELETE, "/api/cart/items/missing", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["count"], 4);

    let (_, body) = shopper.send(Method::DELETE, "/api/cart", None).await;
    assert_eq!(notification_messages(&body), ["Cart cleared"]);
    assert_eq!(body["cart"]["count"], 0);
}

#[tokio::test]
async fn test_shoppers_have_separate_carts() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let mut alice = app.shopper();
    let mut bob = app.shopper();

    alice
        .post(
            "/api/cart/items",
            Some(json!({ "product": product("a", "Scarf", "10.00") })),
        )
        .await;

    let (_, body) = bob.get("/api/cart").await;
    assert_eq!(body["cart"]["count"], 0);

    let (_, body) = alice.get("/api/cart").await;
    assert_eq!(body["cart"]["count"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_cart_is_persisted_after_quiet_period() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let mut shopper = app.shopper();

    shopper
        .post(
            "/api/cart/items",
            Some(json!({ "product": product("a", "Scarf", "10.00"), "quantity": 2 })),
        )
        .await;
    assert!(app.storage.is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn test_checkout_summary_uses_configured_currency() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let (status, body) = app.shopper().get("/api/checkout").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checkout"]["summary"]["currency"], CurrencyCode::GBP.code());
}

#[tokio::test]
async fn test_oversized_add_keeps_cart_usable() {
    let app = TestApp::new(CheckoutRegion::Uk);
    let mut shopper = app.shopper();

    shopper
        .post(
            "/api/cart/items",
            Some(json!({ "product": product("a", "Scarf", "10.00") })),
        )
        .await;
    let (status, body) = shopper
        .post(
            "/api/cart/items",
            Some(json!({
                "product": product("vault", "Vault", "40000000000000000000000000000"),
                "quantity": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart"]["count"], 1);
    assert!(notification_messages(&body).is_empty());

    let (status, body) = shopper.get("/api/cart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        decimal(&body["cart"]["total"]),
        "10.00".parse::<Decimal>().unwrap()
    );
}
