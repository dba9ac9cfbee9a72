// ABOUTME: HTTP integration tests for order placement and lifecycle
// ABOUTME: Covers stock reservation, price snapshots, cancellation restock and admin transitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{create_test_app, create_test_user, TestApp};
use emporium_server::errors::ErrorCode;
use emporium_server::models::OrderStatus;
use emporium_server::permissions::UserRole;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use uuid::Uuid;

/// Active product with `stock` units at `price_cents`
async fn listed_product(app: &TestApp, token: &str, title: &str, price_cents: i64, stock: i64) -> Uuid {
    let response = AxumTestRequest::post("/api/products")
        .bearer(token)
        .json(&json!({
            "title": title,
            "body": "For sale",
            "price_cents": price_cents,
            "stock": stock,
            "status": "active"
        }))
        .send(app.app())
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json();
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn stock_of(app: &TestApp, product_id: Uuid) -> i64 {
    app.resources
        .database
        .get_product(product_id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn place_order(app: &TestApp, token: &str, items: &Value) -> (u16, Value) {
    let response = AxumTestRequest::post("/api/orders")
        .bearer(token)
        .json(&json!({ "items": items }))
        .send(app.app())
        .await;
    (response.status(), response.json())
}

#[tokio::test]
async fn test_place_order_reserves_stock_and_snapshots_prices() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (buyer, buyer_token) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let mug = listed_product(&app, &seller, "Mug", 1200, 5).await;
    let plate = listed_product(&app, &seller, "Plate", 800, 2).await;

    let (status, order) = place_order(
        &app,
        &buyer_token,
        &json!([
            { "product_id": mug, "quantity": 2 },
            { "product_id": plate, "quantity": 1 },
            { "product_id": mug, "quantity": 1 }
        ]),
    )
    .await;

    assert_eq!(status, 201, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["user_id"], buyer.id.to_string());
    assert_eq!(order["currency"], "USD");
    assert_eq!(order["total_cents"], 3 * 1200 + 800);
    // Repeated products are merged into one line
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    assert_eq!(stock_of(&app, mug).await, 2);
    assert_eq!(stock_of(&app, plate).await, 1);

    // Later price changes do not touch the order
    AxumTestRequest::put(&format!("/api/products/{mug}"))
        .bearer(&seller)
        .json(&json!({ "price_cents": 9999 }))
        .send(app.app())
        .await;
    let fetched: Value = AxumTestRequest::get(&format!("/api/orders/{}", order["id"].as_str().unwrap()))
        .bearer(&buyer_token)
        .send(app.app())
        .await
        .json();
    assert_eq!(fetched["total_cents"], 3 * 1200 + 800);
}

#[tokio::test]
async fn test_insufficient_stock_rejects_whole_order() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let plenty = listed_product(&app, &seller, "Plenty", 100, 50).await;
    let scarce = listed_product(&app, &seller, "Scarce", 100, 1).await;

    let (status, body) = place_order(
        &app,
        &buyer,
        &json!([
            { "product_id": plenty, "quantity": 10 },
            { "product_id": scarce, "quantity": 2 }
        ]),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALUE_OUT_OF_RANGE");
    // The transaction rolled back the first reservation too
    assert_eq!(stock_of(&app, plenty).await, 50);
    assert_eq!(stock_of(&app, scarce).await, 1);
}

#[tokio::test]
async fn test_order_validation() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let product = listed_product(&app, &seller, "Widget", 100, 10).await;

    let (empty, _) = place_order(&app, &buyer, &json!([])).await;
    assert_eq!(empty, 400);

    let (zero, _) = place_order(&app, &buyer, &json!([{ "product_id": product, "quantity": 0 }])).await;
    assert_eq!(zero, 400);

    let (bad_id, _) = place_order(&app, &buyer, &json!([{ "product_id": "nope", "quantity": 1 }])).await;
    assert_eq!(bad_id, 400);

    let (missing, _) = place_order(
        &app,
        &buyer,
        &json!([{ "product_id": Uuid::new_v4(), "quantity": 1 }]),
    )
    .await;
    assert_eq!(missing, 404);

    let draft = {
        let response = AxumTestRequest::post("/api/products")
            .bearer(&seller)
            .json(&json!({ "title": "Draft", "body": "b", "price_cents": 1, "stock": 5 }))
            .send(app.app())
            .await;
        let body: Value = response.json();
        body["id"].as_str().unwrap().to_owned()
    };
    let (inactive, _) = place_order(&app, &buyer, &json!([{ "product_id": draft, "quantity": 1 }])).await;
    assert_eq!(inactive, 400);

    let anonymous = AxumTestRequest::post("/api/orders")
        .json(&json!({ "items": [{ "product_id": product, "quantity": 1 }] }))
        .send(app.app())
        .await;
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn test_cancel_restores_stock_once() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let product = listed_product(&app, &seller, "Chair", 5000, 4).await;

    let (_, order) = place_order(&app, &buyer, &json!([{ "product_id": product, "quantity": 3 }])).await;
    assert_eq!(stock_of(&app, product).await, 1);
    let cancel_uri = format!("/api/orders/{}/cancel", order["id"].as_str().unwrap());

    let cancelled = AxumTestRequest::post(&cancel_uri).bearer(&buyer).send(app.app()).await;
    assert_eq!(cancelled.status(), 200);
    let body: Value = cancelled.json();
    assert_eq!(body["status"], "cancelled");
    assert_eq!(stock_of(&app, product).await, 4);

    let again = AxumTestRequest::post(&cancel_uri).bearer(&buyer).send(app.app()).await;
    assert_eq!(again.status(), 400);
    assert_eq!(stock_of(&app, product).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_cancellations_restore_stock_once() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let product = listed_product(&app, &seller, "Stool", 1500, 6).await;

    let (_, order) = place_order(&app, &buyer, &json!([{ "product_id": product, "quantity": 4 }])).await;
    let order_id: Uuid = order["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(stock_of(&app, product).await, 2);

    let mut cancels = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let resources = app.resources.clone();
        cancels.spawn(async move {
            resources
                .database
                .update_order_status(order_id, OrderStatus::Cancelled)
                .await
        });
    }

    let mut succeeded = 0;
    while let Some(result) = cancels.join_next().await {
        match result.unwrap() {
            Ok(order) => {
                assert_eq!(order.status, OrderStatus::Cancelled);
                succeeded += 1;
            }
            Err(e) => assert_eq!(e.code, ErrorCode::InvalidInput),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(stock_of(&app, product).await, 6);
}

#[tokio::test]
async fn test_orders_are_private_to_buyer_and_admin() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let (_, stranger) = create_test_user(&app.resources, "stranger@example.com", UserRole::User).await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;
    let product = listed_product(&app, &seller, "Desk", 10000, 2).await;

    let (_, order) = place_order(&app, &buyer, &json!([{ "product_id": product, "quantity": 1 }])).await;
    let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());

    let forbidden = AxumTestRequest::get(&uri).bearer(&stranger).send(app.app()).await;
    assert_eq!(forbidden.status(), 403);

    let forbidden_cancel = AxumTestRequest::post(&format!("{uri}/cancel"))
        .bearer(&stranger)
        .send(app.app())
        .await;
    assert_eq!(forbidden_cancel.status(), 403);

    let as_admin = AxumTestRequest::get(&uri).bearer(&admin).send(app.app()).await;
    assert_eq!(as_admin.status(), 200);

    let buyer_list: Value = AxumTestRequest::get("/api/orders").bearer(&buyer).send(app.app()).await.json();
    assert_eq!(buyer_list["total"], 1);
    let stranger_list: Value = AxumTestRequest::get("/api/orders")
        .bearer(&stranger)
        .send(app.app())
        .await
        .json();
    assert_eq!(stranger_list["total"], 0);
    let admin_list: Value = AxumTestRequest::get("/api/orders").bearer(&admin).send(app.app()).await.json();
    assert_eq!(admin_list["total"], 1);
}

#[tokio::test]
async fn test_admin_status_transitions() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;
    let product = listed_product(&app, &seller, "Bike", 30000, 1).await;

    let (_, order) = place_order(&app, &buyer, &json!([{ "product_id": product, "quantity": 1 }])).await;
    let status_uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());

    let not_admin = AxumTestRequest::put(&status_uri)
        .bearer(&buyer)
        .json(&json!({ "status": "paid" }))
        .send(app.app())
        .await;
    assert_eq!(not_admin.status(), 403);

    let skip = AxumTestRequest::put(&status_uri)
        .bearer(&admin)
        .json(&json!({ "status": "delivered" }))
        .send(app.app())
        .await;
    assert_eq!(skip.status(), 400);

    for next in ["paid", "shipped", "delivered"] {
        let response = AxumTestRequest::put(&status_uri)
            .bearer(&admin)
            .json(&json!({ "status": next }))
            .send(app.app())
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json();
        assert_eq!(body["status"], next);
    }

    let terminal = AxumTestRequest::put(&status_uri)
        .bearer(&admin)
        .json(&json!({ "status": "cancelled" }))
        .send(app.app())
        .await;
    assert_eq!(terminal.status(), 400);
    assert_eq!(stock_of(&app, product).await, 0);
}

#[tokio::test]
async fn test_deleted_product_keeps_order_lines() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;
    let product = listed_product(&app, &seller, "Vase", 2500, 3).await;

    let (_, order) = place_order(&app, &buyer, &json!([{ "product_id": product, "quantity": 1 }])).await;
    let deleted = AxumTestRequest::delete(&format!("/api/products/{product}"))
        .bearer(&seller)
        .send(app.app())
        .await;
    assert_eq!(deleted.status(), 204);

    let fetched: Value = AxumTestRequest::get(&format!("/api/orders/{}", order["id"].as_str().unwrap()))
        .bearer(&buyer)
        .send(app.app())
        .await
        .json();
    assert_eq!(fetched["items"][0]["title"], "Vase");
    assert!(fetched["items"][0]["product_id"].is_null());
}
