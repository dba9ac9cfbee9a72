// ABOUTME: HTTP integration tests for product routes
// ABOUTME: Covers price validation, store currency, stock filters and seller ownership
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{create_test_app, create_test_user, TestApp};
use emporium_server::permissions::UserRole;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_product(app: &TestApp, token: &str, body: &Value) -> Value {
    let response = AxumTestRequest::post("/api/products")
        .bearer(token)
        .json(body)
        .send(app.app())
        .await;
    assert_eq!(response.status(), 201);
    response.json()
}

#[tokio::test]
async fn test_create_product_defaults() {
    let app = create_test_app().await;
    let (seller, token) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;

    let product = create_product(
        &app,
        &token,
        &json!({ "title": "Blue Mug", "body": "Holds coffee", "price_cents": 1250 }),
    )
    .await;

    assert_eq!(product["slug"], "blue-mug");
    assert_eq!(product["status"], "draft");
    assert_eq!(product["stock"], 0);
    assert_eq!(product["currency"], "USD");
    assert_eq!(product["seller_id"], seller.id.to_string());
}

#[tokio::test]
async fn test_create_product_uses_store_currency_setting() {
    let app = create_test_app().await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;

    let put = AxumTestRequest::put("/api/settings/store.currency")
        .bearer(&admin)
        .json(&json!({ "value": "eur" }))
        .send(app.app())
        .await;
    assert_eq!(put.status(), 200);

    let product = create_product(
        &app,
        &admin,
        &json!({ "title": "Teapot", "body": "Ceramic", "price_cents": 3000 }),
    )
    .await;
    assert_eq!(product["currency"], "EUR");

    let explicit = create_product(
        &app,
        &admin,
        &json!({ "title": "Kettle", "body": "Steel", "price_cents": 3000, "currency": "gbp" }),
    )
    .await;
    assert_eq!(explicit["currency"], "GBP");
}

#[tokio::test]
async fn test_create_product_validation() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;

    let missing_price = AxumTestRequest::post("/api/products")
        .bearer(&token)
        .json(&json!({ "title": "Thing", "body": "Stuff" }))
        .send(app.app())
        .await;
    assert_eq!(missing_price.status(), 400);
    assert_eq!(missing_price.error_code(), "MISSING_REQUIRED_FIELD");

    let negative_price = AxumTestRequest::post("/api/products")
        .bearer(&token)
        .json(&json!({ "title": "Thing", "body": "Stuff", "price_cents": -1 }))
        .send(app.app())
        .await;
    assert_eq!(negative_price.status(), 400);

    let negative_stock = AxumTestRequest::post("/api/products")
        .bearer(&token)
        .json(&json!({ "title": "Thing", "body": "Stuff", "price_cents": 1, "stock": -5 }))
        .send(app.app())
        .await;
    assert_eq!(negative_stock.status(), 400);

    let bad_currency = AxumTestRequest::post("/api/products")
        .bearer(&token)
        .json(&json!({ "title": "Thing", "body": "Stuff", "price_cents": 1, "currency": "EURO" }))
        .send(app.app())
        .await;
    assert_eq!(bad_currency.status(), 400);

    let wrong_category_kind = AxumTestRequest::post("/api/products")
        .bearer(&token)
        .json(&json!({ "title": "Thing", "body": "Stuff", "price_cents": 1, "category": "gadgets" }))
        .send(app.app())
        .await;
    assert_eq!(wrong_category_kind.status(), 404);
}

#[tokio::test]
async fn test_list_products_visibility_and_stock_filter() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;

    create_product(
        &app,
        &seller,
        &json!({ "title": "In Stock", "body": "b", "price_cents": 100, "stock": 3, "status": "active" }),
    )
    .await;
    create_product(
        &app,
        &seller,
        &json!({ "title": "Sold Out", "body": "b", "price_cents": 100, "stock": 0, "status": "active" }),
    )
    .await;
    create_product(
        &app,
        &seller,
        &json!({ "title": "Hidden", "body": "b", "price_cents": 100, "stock": 9 }),
    )
    .await;

    let public: Value = AxumTestRequest::get("/api/products").send(app.app()).await.json();
    assert_eq!(public["total"], 2);

    let in_stock: Value = AxumTestRequest::get("/api/products?in_stock=true")
        .send(app.app())
        .await
        .json();
    assert_eq!(in_stock["total"], 1);
    assert_eq!(in_stock["items"][0]["title"], "In Stock");

    let own: Value = AxumTestRequest::get("/api/products")
        .bearer(&seller)
        .send(app.app())
        .await
        .json();
    assert_eq!(own["total"], 3);
}

#[tokio::test]
async fn test_update_product_ownership_and_fields() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, other) = create_test_user(&app.resources, "other@example.com", UserRole::User).await;

    let product = create_product(
        &app,
        &seller,
        &json!({ "title": "Lamp", "body": "Bright", "price_cents": 4000, "stock": 1 }),
    )
    .await;
    let uri = format!("/api/products/{}", product["id"].as_str().unwrap());

    let forbidden = AxumTestRequest::put(&uri)
        .bearer(&other)
        .json(&json!({ "price_cents": 1 }))
        .send(app.app())
        .await;
    assert_eq!(forbidden.status(), 403);

    let updated: Value = AxumTestRequest::put(&uri)
        .bearer(&seller)
        .json(&json!({ "price_cents": 3500, "stock": 10, "status": "active" }))
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::OK)
        .json();
    assert_eq!(updated["price_cents"], 3500);
    assert_eq!(updated["stock"], 10);
    assert_eq!(updated["status"], "active");
    assert_eq!(updated["title"], "Lamp");

    let invalid = AxumTestRequest::put(&uri)
        .bearer(&seller)
        .json(&json!({ "stock": -1 }))
        .send(app.app())
        .await;
    assert_eq!(invalid.status(), 400);

    let deleted = AxumTestRequest::delete(&uri).bearer(&seller).send(app.app()).await;
    assert_eq!(deleted.status(), 204);
}

#[tokio::test]
async fn test_update_keeps_stock_reserved_by_checkout() {
    let app = create_test_app().await;
    let (_, seller) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let (_, buyer) = create_test_user(&app.resources, "buyer@example.com", UserRole::User).await;

    let product = create_product(
        &app,
        &seller,
        &json!({ "title": "Kettle", "body": "Boils", "price_cents": 2500, "stock": 5, "status": "active" }),
    )
    .await;
    let id: Uuid = product["id"].as_str().unwrap().parse().unwrap();

    // The edit reads the row first; a checkout commits before it writes
    let mut stale = app.resources.database.get_product(id).await.unwrap().unwrap();
    AxumTestRequest::post("/api/orders")
        .bearer(&buyer)
        .json(&json!({ "items": [{ "product_id": id, "quantity": 3 }] }))
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    stale.title = "Steel Kettle".to_owned();
    let saved = app
        .resources
        .database
        .update_product(&stale, None, None)
        .await
        .unwrap();
    assert_eq!(saved.stock, 2);
    assert_eq!(saved.title, "Steel Kettle");

    let renamed: Value = AxumTestRequest::put(&format!("/api/products/{id}"))
        .bearer(&seller)
        .json(&json!({ "title": "Copper Kettle" }))
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::OK)
        .json();
    assert_eq!(renamed["stock"], 2);

    let stored = app.resources.database.get_product(id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 2);
}
