// ABOUTME: HTTP integration tests for post routes
// ABOUTME: Covers visibility of drafts, slugs, filters, ownership and response caching
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

async fn create_post(app: &TestApp, token: &str, body: &Value) -> Value {
    let response = AxumTestRequest::post("/api/posts")
        .bearer(token)
        .json(body)
        .send(app.app())
        .await;
    assert_eq!(response.status(), 201, "{}", response.status());
    response.json()
}

async fn create_category(app: &TestApp, admin_token: &str, name: &str, kind: &str) -> Value {
    let response = AxumTestRequest::post("/api/categories")
        .bearer(admin_token)
        .json(&json!({ "name": name, "kind": kind }))
        .send(app.app())
        .await;
    assert_eq!(response.status(), 201);
    response.json()
}

// ============================================================================
// Creation and validation
// ============================================================================

#[tokio::test]
async fn test_create_requires_session() {
    let app = create_test_app().await;

    let response = AxumTestRequest::post("/api/posts")
        .json(&json!({ "title": "Hello", "content": "World" }))
        .send(app.app())
        .await;

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_create_post_defaults_and_slug() {
    let app = create_test_app().await;
    let (author, token) = create_test_user(&app.resources, "author@example.com", UserRole::User).await;

    let post = create_post(
        &app,
        &token,
        &json!({ "title": "Hello, World!", "content": "<p>First   post</p>", "tags": ["Rust", "rust", "Web"] }),
    )
    .await;

    assert_eq!(post["slug"], "hello-world");
    assert_eq!(post["status"], "draft");
    assert_eq!(post["type"], "article");
    assert_eq!(post["author_id"], author.id.to_string());
    assert!(post["published_at"].is_null());
    assert_eq!(post["tags"].as_array().unwrap().len(), 2);
    assert!(!post["content"].as_str().unwrap().contains('<'));

    // Same title again gets a suffixed slug
    let again = create_post(&app, &token, &json!({ "title": "Hello world", "content": "Again" })).await;
    let slug = again["slug"].as_str().unwrap();
    assert_ne!(slug, "hello-world");
    assert!(slug.starts_with("hello-world-"));
}

#[tokio::test]
async fn test_create_published_sets_timestamp() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "pub@example.com", UserRole::User).await;

    let post = create_post(
        &app,
        &token,
        &json!({ "title": "Live", "content": "Now", "status": "published", "type": "news" }),
    )
    .await;

    assert_eq!(post["status"], "published");
    assert_eq!(post["type"], "news");
    assert!(post["published_at"].is_string());
}

#[tokio::test]
async fn test_create_post_validation() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "val@example.com", UserRole::User).await;

    let missing_title = AxumTestRequest::post("/api/posts")
        .bearer(&token)
        .json(&json!({ "content": "Body" }))
        .send(app.app())
        .await;
    assert_eq!(missing_title.status(), 400);
    assert_eq!(missing_title.error_code(), "MISSING_REQUIRED_FIELD");

    let long_title = AxumTestRequest::post("/api/posts")
        .bearer(&token)
        .json(&json!({ "title": "x".repeat(201), "content": "Body" }))
        .send(app.app())
        .await;
    assert_eq!(long_title.status(), 400);

    let bad_type = AxumTestRequest::post("/api/posts")
        .bearer(&token)
        .json(&json!({ "title": "T", "content": "Body", "type": "poem" }))
        .send(app.app())
        .await;
    assert_eq!(bad_type.status(), 400);

    let unknown_category = AxumTestRequest::post("/api/posts")
        .bearer(&token)
        .json(&json!({ "title": "T", "content": "Body", "category": "nope" }))
        .send(app.app())
        .await;
    assert_eq!(unknown_category.status(), 404);
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn test_drafts_visible_only_to_owner_and_admin() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let (_, other) = create_test_user(&app.resources, "other@example.com", UserRole::User).await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;

    let draft = create_post(&app, &owner, &json!({ "title": "Secret", "content": "Draft" })).await;
    let uri = format!("/api/posts/{}", draft["id"].as_str().unwrap());

    let anonymous = AxumTestRequest::get(&uri).send(app.app()).await;
    assert_eq!(anonymous.status(), 404);

    let stranger = AxumTestRequest::get(&uri).bearer(&other).send(app.app()).await;
    assert_eq!(stranger.status(), 404);

    let as_owner = AxumTestRequest::get(&uri).bearer(&owner).send(app.app()).await;
    assert_eq!(as_owner.status(), 200);

    let as_admin = AxumTestRequest::get(&uri).bearer(&admin).send(app.app()).await;
    assert_eq!(as_admin.status(), 200);

    let public_list: Value = AxumTestRequest::get("/api/posts").send(app.app()).await.json();
    assert_eq!(public_list["total"], 0);

    let owner_list: Value = AxumTestRequest::get("/api/posts")
        .bearer(&owner)
        .send(app.app())
        .await
        .json();
    assert_eq!(owner_list["total"], 1);
}

#[tokio::test]
async fn test_malformed_id_is_not_found() {
    let app = create_test_app().await;

    let response = AxumTestRequest::get("/api/posts/not-a-uuid").send(app.app()).await;
    assert_eq!(response.status(), 404);
    assert_eq!(response.error_code(), "RESOURCE_NOT_FOUND");
}

// ============================================================================
// Listing and filters
// ============================================================================

#[tokio::test]
async fn test_list_filters() {
    let app = create_test_app().await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;
    let category = create_category(&app, &admin, "Release Notes", "post").await;

    create_post(
        &app,
        &admin,
        &json!({ "title": "v1", "content": "c", "status": "published", "category": "release-notes", "tags": ["launch"] }),
    )
    .await;
    create_post(
        &app,
        &admin,
        &json!({ "title": "News", "content": "c", "status": "published", "type": "news" }),
    )
    .await;

    let by_category: Value = AxumTestRequest::get(&format!(
        "/api/posts?category={}",
        category["id"].as_str().unwrap()
    ))
    .send(app.app())
    .await
    .json();
    assert_eq!(by_category["total"], 1);
    assert_eq!(by_category["items"][0]["title"], "v1");

    let by_tag: Value = AxumTestRequest::get("/api/posts?tag=Launch").send(app.app()).await.json();
    assert_eq!(by_tag["total"], 1);

    let by_type: Value = AxumTestRequest::get("/api/posts?type=news").send(app.app()).await.json();
    assert_eq!(by_type["total"], 1);
    assert_eq!(by_type["items"][0]["title"], "News");

    let unknown: Value = AxumTestRequest::get("/api/posts?category=missing")
        .send(app.app())
        .await
        .json();
    assert_eq!(unknown["total"], 0);

    let paged: Value = AxumTestRequest::get("/api/posts?limit=1&offset=1")
        .send(app.app())
        .await
        .json();
    assert_eq!(paged["total"], 2);
    assert_eq!(paged["items"].as_array().unwrap().len(), 1);
    assert_eq!(paged["limit"], 1);

    let bad_limit = AxumTestRequest::get("/api/posts?limit=abc").send(app.app()).await;
    assert_eq!(bad_limit.status(), 400);
}

#[tokio::test]
async fn test_anonymous_list_is_cached_until_invalidated() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "cache@example.com", UserRole::User).await;

    let before: Value = AxumTestRequest::get("/api/posts").send(app.app()).await.json();
    assert_eq!(before["total"], 0);

    create_post(
        &app,
        &token,
        &json!({ "title": "Fresh", "content": "c", "status": "published" }),
    )
    .await;

    // Invalidation runs in the background, so the cached page is still served
    let stale: Value = AxumTestRequest::get("/api/posts").send(app.app()).await.json();
    assert_eq!(stale["total"], 0);

    assert!(app.drain_jobs().await >= 1);

    let fresh: Value = AxumTestRequest::get("/api/posts").send(app.app()).await.json();
    assert_eq!(fresh["total"], 1);
}

// ============================================================================
// Update and delete
// ============================================================================

#[tokio::test]
async fn test_update_is_partial_and_keeps_slug() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "edit@example.com", UserRole::User).await;
    let post = create_post(&app, &token, &json!({ "title": "Original", "content": "Body", "tags": ["a"] })).await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let response = AxumTestRequest::put(&uri)
        .bearer(&token)
        .json(&json!({ "title": "Renamed", "status": "published" }))
        .send(app.app())
        .await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json();

    assert_eq!(updated["title"], "Renamed");
    assert_eq!(updated["slug"], "original");
    assert_eq!(updated["content"], "Body");
    assert_eq!(updated["tags"].as_array().unwrap().len(), 1);
    assert!(updated["published_at"].is_string());
}

#[tokio::test]
async fn test_update_and_delete_require_ownership() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let (_, other) = create_test_user(&app.resources, "other@example.com", UserRole::User).await;
    let (_, admin) = create_test_user(&app.resources, "admin@example.com", UserRole::Admin).await;
    let post = create_post(
        &app,
        &owner,
        &json!({ "title": "Mine", "content": "Body", "status": "published" }),
    )
    .await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let forbidden = AxumTestRequest::put(&uri)
        .bearer(&other)
        .json(&json!({ "title": "Hijacked" }))
        .send(app.app())
        .await;
    assert_eq!(forbidden.status(), 403);

    let forbidden_delete = AxumTestRequest::delete(&uri).bearer(&other).send(app.app()).await;
    assert_eq!(forbidden_delete.status(), 403);

    let admin_edit = AxumTestRequest::put(&uri)
        .bearer(&admin)
        .json(&json!({ "title": "Moderated" }))
        .send(app.app())
        .await;
    assert_eq!(admin_edit.status(), 200);

    let deleted = AxumTestRequest::delete(&uri).bearer(&owner).send(app.app()).await;
    assert_eq!(deleted.status(), 204);

    let gone = AxumTestRequest::get(&uri).bearer(&owner).send(app.app()).await;
    assert_eq!(gone.status(), 404);
}
