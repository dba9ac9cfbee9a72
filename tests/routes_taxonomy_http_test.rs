// ABOUTME: HTTP integration tests for categories, tags and site settings
// ABOUTME: Covers admin-only mutations, slug handling, cascades and cached reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{create_test_app, create_test_user};
use emporium_server::permissions::UserRole;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

// ============================================================================
// Categories
// ============================================================================

#[tokio::test]
async fn test_category_crud_is_admin_only() {
    let app = create_test_app().await;
    let (_, user) = create_test_user(&app.resources, "user@example.com", UserRole::User).await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;

    let forbidden = AxumTestRequest::post("/api/categories")
        .bearer(&user)
        .json(&json!({ "name": "Guides" }))
        .send(app.app())
        .await;
    assert_eq!(forbidden.status(), 403);
    assert_eq!(forbidden.error_code(), "PERMISSION_DENIED");

    let created: Value = AxumTestRequest::post("/api/categories")
        .bearer(&admin)
        .json(&json!({ "name": "How-To Guides", "description": "Step by step" }))
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::CREATED)
        .json();
    assert_eq!(created["slug"], "how-to-guides");
    assert_eq!(created["kind"], "post");
    let uri = format!("/api/categories/{}", created["id"].as_str().unwrap());

    let duplicate = AxumTestRequest::post("/api/categories")
        .bearer(&admin)
        .json(&json!({ "name": "How to guides" }))
        .send(app.app())
        .await;
    assert_eq!(duplicate.status(), 409);

    // Same name is fine for the other kind
    let product_kind = AxumTestRequest::post("/api/categories")
        .bearer(&admin)
        .json(&json!({ "name": "How-To Guides", "kind": "product" }))
        .send(app.app())
        .await;
    assert_eq!(product_kind.status(), 201);

    let renamed: Value = AxumTestRequest::put(&uri)
        .bearer(&admin)
        .json(&json!({ "name": "Tutorials" }))
        .send(app.app())
        .await
        .json();
    assert_eq!(renamed["slug"], "tutorials");
    assert_eq!(renamed["description"], "Step by step");

    let fetched = AxumTestRequest::get(&uri).send(app.app()).await;
    assert_eq!(fetched.status(), 200);

    let deleted = AxumTestRequest::delete(&uri).bearer(&admin).send(app.app()).await;
    assert_eq!(deleted.status(), 204);
    let gone = AxumTestRequest::get(&uri).send(app.app()).await;
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_category_list_by_kind() {
    let app = create_test_app().await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;

    for (name, kind) in [("News", "post"), ("Books", "product"), ("Games", "product")] {
        AxumTestRequest::post("/api/categories")
            .bearer(&admin)
            .json(&json!({ "name": name, "kind": kind }))
            .send(app.app())
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }
    app.drain_jobs().await;

    let products: Vec<Value> = AxumTestRequest::get("/api/categories?kind=product")
        .send(app.app())
        .await
        .json();
    assert_eq!(products.len(), 2);

    let all: Vec<Value> = AxumTestRequest::get("/api/categories").send(app.app()).await.json();
    assert_eq!(all.len(), 3);

    let bad_kind = AxumTestRequest::get("/api/categories?kind=shoes").send(app.app()).await;
    assert_eq!(bad_kind.status(), 400);
}

#[tokio::test]
async fn test_deleting_category_detaches_posts() {
    let app = create_test_app().await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;

    let category: Value = AxumTestRequest::post("/api/categories")
        .bearer(&admin)
        .json(&json!({ "name": "Temporary" }))
        .send(app.app())
        .await
        .json();
    let post: Value = AxumTestRequest::post("/api/posts")
        .bearer(&admin)
        .json(&json!({ "title": "Filed", "content": "c", "category": "temporary" }))
        .send(app.app())
        .await
        .json();
    assert_eq!(post["category_id"], category["id"]);

    AxumTestRequest::delete(&format!("/api/categories/{}", category["id"].as_str().unwrap()))
        .bearer(&admin)
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);

    let reloaded: Value = AxumTestRequest::get(&format!("/api/posts/{}", post["id"].as_str().unwrap()))
        .bearer(&admin)
        .send(app.app())
        .await
        .json();
    assert!(reloaded["category_id"].is_null());
}

// ============================================================================
// Tags
// ============================================================================

#[tokio::test]
async fn test_tags_are_shared_and_deletable() {
    let app = create_test_app().await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;
    let (_, user) = create_test_user(&app.resources, "user@example.com", UserRole::User).await;

    let post: Value = AxumTestRequest::post("/api/posts")
        .bearer(&user)
        .json(&json!({ "title": "Tagged", "content": "c", "tags": ["Rust", "Async"], "status": "published" }))
        .send(app.app())
        .await
        .json();
    AxumTestRequest::post("/api/products")
        .bearer(&user)
        .json(&json!({ "title": "Book", "body": "b", "price_cents": 1, "tags": ["rust"] }))
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let tags: Vec<Value> = AxumTestRequest::get("/api/tags").send(app.app()).await.json();
    assert_eq!(tags.len(), 2);
    let rust = tags.iter().find(|tag| tag["slug"] == "rust").unwrap();
    let rust_uri = format!("/api/tags/{}", rust["id"].as_str().unwrap());

    let forbidden = AxumTestRequest::delete(&rust_uri).bearer(&user).send(app.app()).await;
    assert_eq!(forbidden.status(), 403);

    let deleted = AxumTestRequest::delete(&rust_uri).bearer(&admin).send(app.app()).await;
    assert_eq!(deleted.status(), 204);
    app.drain_jobs().await;

    let remaining: Vec<Value> = AxumTestRequest::get("/api/tags").send(app.app()).await.json();
    assert_eq!(remaining.len(), 1);

    let reloaded: Value = AxumTestRequest::get(&format!("/api/posts/{}", post["id"].as_str().unwrap()))
        .send(app.app())
        .await
        .json();
    assert_eq!(reloaded["tags"].as_array().unwrap().len(), 1);
    assert_eq!(reloaded["tags"][0]["slug"], "async");
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_settings_round_trip() {
    let app = create_test_app().await;
    let (admin_user, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;
    let (_, user) = create_test_user(&app.resources, "user@example.com", UserRole::User).await;

    let empty: Value = AxumTestRequest::get("/api/settings").send(app.app()).await.json();
    assert_eq!(empty, json!({}));

    let forbidden = AxumTestRequest::put("/api/settings/site.title")
        .bearer(&user)
        .json(&json!({ "value": "Mine" }))
        .send(app.app())
        .await;
    assert_eq!(forbidden.status(), 403);

    let stored: Value = AxumTestRequest::put("/api/settings/site.title")
        .bearer(&admin)
        .json(&json!({ "value": { "text": "Emporium", "visible": true } }))
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::OK)
        .json();
    assert_eq!(stored["key"], "site.title");
    assert_eq!(stored["updated_by"], admin_user.id.to_string());

    let single: Value = AxumTestRequest::get("/api/settings/site.title").send(app.app()).await.json();
    assert_eq!(single["value"]["text"], "Emporium");

    // The cached empty map is replaced once invalidation has run
    app.drain_jobs().await;
    let all: Value = AxumTestRequest::get("/api/settings").send(app.app()).await.json();
    assert_eq!(all["site.title"]["visible"], true);

    let bad_key = AxumTestRequest::put("/api/settings/Bad%20Key")
        .bearer(&admin)
        .json(&json!({ "value": 1 }))
        .send(app.app())
        .await;
    assert_eq!(bad_key.status(), 400);

    let deleted = AxumTestRequest::delete("/api/settings/site.title")
        .bearer(&admin)
        .send(app.app())
        .await;
    assert_eq!(deleted.status(), 204);
    app.drain_jobs().await;

    let missing = AxumTestRequest::get("/api/settings/site.title").send(app.app()).await;
    assert_eq!(missing.status(), 404);
}
