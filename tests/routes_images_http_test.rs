// ABOUTME: HTTP integration tests for multipart image uploads
// ABOUTME: Covers type sniffing, size limits, staged-file cleanup, background optimization and cascades
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{
    create_test_app, create_test_app_with, create_test_user, png_bytes, stored_file_count, TestApp,
};
use emporium_server::models::ImageStatus;
use emporium_server::permissions::UserRole;
use helpers::axum_test::{AxumTestRequest, AxumTestResponse, Part};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_post(app: &TestApp, token: &str, status: &str) -> String {
    let response = AxumTestRequest::post("/api/posts")
        .bearer(token)
        .json(&json!({ "title": "Gallery", "content": "Pictures", "status": status }))
        .send(app.app())
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json();
    body["id"].as_str().unwrap().to_owned()
}

async fn upload(app: &TestApp, token: &str, parts: &[Part<'_>]) -> AxumTestResponse {
    AxumTestRequest::post("/api/images")
        .bearer(token)
        .multipart(parts)
        .send(app.app())
        .await
}

// ============================================================================
// Successful uploads
// ============================================================================

#[tokio::test]
async fn test_upload_is_optimized_in_background() {
    let app = create_test_app_with(|config| config.media.image_max_width = 64).await;
    let (owner, token) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &token, "published").await;
    let png = png_bytes(200, 100);

    let response = upload(
        &app,
        &token,
        &[
            Part::File("file", "../../holiday photo.png", &png),
            Part::Text("postId", &post_id),
            Part::Text("alt", "Beach <at> dusk"),
        ],
    )
    .await;
    assert_eq!(response.status(), 201);
    let image: Value = response.json();
    assert_eq!(image["status"], "pending");
    assert_eq!(image["mime_type"], "image/png");
    assert_eq!(image["owner_id"], owner.id.to_string());
    assert_eq!(image["parent"]["type"], "post");
    assert_eq!(image["parent"]["id"], post_id);
    assert!(!image["file_name"].as_str().unwrap().contains('/'));
    assert!(!image["alt_text"].as_str().unwrap().contains('<'));
    assert!(image["optimized_path"].is_null());
    assert_eq!(stored_file_count(&app.resources), 1);

    assert!(app.drain_jobs().await >= 1);

    let id: Uuid = image["id"].as_str().unwrap().parse().unwrap();
    let stored = app.resources.database.get_image(id).await.unwrap().unwrap();
    assert_eq!(stored.status, ImageStatus::Ready);
    assert_eq!(stored.width, Some(64));
    assert_eq!(stored.height, Some(32));
    let optimized = stored.optimized_path.unwrap();
    assert!(app.resources.media.exists(&optimized).await);
    assert_eq!(stored_file_count(&app.resources), 2);

    let fetched: Value = AxumTestRequest::get(&format!("/api/images/{id}"))
        .send(app.app())
        .await
        .json();
    assert_eq!(fetched["status"], "ready");

    let listed: Vec<Value> = AxumTestRequest::get(&format!("/api/posts/{post_id}/images"))
        .send(app.app())
        .await
        .json();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_upload_to_product() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "seller@example.com", UserRole::User).await;
    let product: Value = AxumTestRequest::post("/api/products")
        .bearer(&token)
        .json(&json!({ "title": "Poster", "body": "Paper", "price_cents": 900, "status": "active" }))
        .send(app.app())
        .await
        .json();
    let product_id = product["id"].as_str().unwrap();
    let png = png_bytes(8, 8);

    let response = upload(
        &app,
        &token,
        &[
            Part::Text("product_id", product_id),
            Part::File("file", "poster.png", &png),
        ],
    )
    .await;
    assert_eq!(response.status(), 201);
    let image: Value = response.json();
    assert_eq!(image["parent"]["type"], "product");

    let listed: Vec<Value> = AxumTestRequest::get(&format!("/api/products/{product_id}/images"))
        .send(app.app())
        .await
        .json();
    assert_eq!(listed.len(), 1);
}

// ============================================================================
// Rejections leave nothing on disk
// ============================================================================

#[tokio::test]
async fn test_unsupported_type_is_rejected() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &token, "published").await;

    let response = upload(
        &app,
        &token,
        &[
            Part::File("file", "notes.png", b"just some text pretending to be a picture"),
            Part::Text("postId", &post_id),
        ],
    )
    .await;

    assert_eq!(response.status(), 415);
    assert_eq!(response.error_code(), "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(stored_file_count(&app.resources), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = create_test_app_with(|config| config.media.max_upload_bytes = 1024).await;
    let (_, token) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &token, "published").await;

    let mut big = b"\x89PNG\r\n\x1a\n".to_vec();
    big.resize(4096, 7);

    let response = upload(
        &app,
        &token,
        &[Part::File("file", "big.png", &big), Part::Text("postId", &post_id)],
    )
    .await;

    assert_eq!(response.status(), 413);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(body["error"]["details"]["max_bytes"], 1024);
    assert_eq!(stored_file_count(&app.resources), 0);
}

#[tokio::test]
async fn test_staged_file_removed_when_parent_checks_fail() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let (_, other) = create_test_user(&app.resources, "other@example.com", UserRole::User).await;
    let post_id = create_post(&app, &owner, "published").await;
    let png = png_bytes(4, 4);

    let not_owner = upload(
        &app,
        &other,
        &[Part::File("file", "a.png", &png), Part::Text("postId", &post_id)],
    )
    .await;
    assert_eq!(not_owner.status(), 403);
    assert_eq!(stored_file_count(&app.resources), 0);

    let missing_post = Uuid::new_v4().to_string();
    let missing = upload(
        &app,
        &owner,
        &[Part::File("file", "a.png", &png), Part::Text("postId", &missing_post)],
    )
    .await;
    assert_eq!(missing.status(), 404);
    assert_eq!(stored_file_count(&app.resources), 0);

    let both = upload(
        &app,
        &owner,
        &[
            Part::File("file", "a.png", &png),
            Part::Text("postId", &post_id),
            Part::Text("productId", &missing_post),
        ],
    )
    .await;
    assert_eq!(both.status(), 400);

    let neither = upload(&app, &owner, &[Part::File("file", "a.png", &png)]).await;
    assert_eq!(neither.status(), 400);
    assert_eq!(neither.error_code(), "MISSING_REQUIRED_FIELD");
    assert_eq!(stored_file_count(&app.resources), 0);

    // Nothing was enqueued for the rejected uploads
    let queued = app.resources.jobs.snapshot().await;
    assert!(queued
        .iter()
        .all(|envelope| envelope.job.kind() != "optimize_image"));
}

#[tokio::test]
async fn test_staged_file_removed_when_insert_fails() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &owner, "published").await;
    let png = png_bytes(4, 4);

    // Every check passes, then the row insert hits a missing table
    sqlx::query("DROP TABLE images")
        .execute(app.resources.database.pool())
        .await
        .unwrap();

    let response = upload(
        &app,
        &owner,
        &[Part::File("file", "a.png", &png), Part::Text("postId", &post_id)],
    )
    .await;

    assert_eq!(response.status(), 500);
    assert_eq!(response.error_code(), "DATABASE_ERROR");
    assert_eq!(stored_file_count(&app.resources), 0);
    let queued = app.resources.jobs.snapshot().await;
    assert!(queued
        .iter()
        .all(|envelope| envelope.job.kind() != "optimize_image"));
}

#[tokio::test]
async fn test_upload_requires_session_and_file() {
    let app = create_test_app().await;
    let (_, token) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &token, "published").await;

    let anonymous = AxumTestRequest::post("/api/images")
        .multipart(&[Part::Text("postId", &post_id)])
        .send(app.app())
        .await;
    assert_eq!(anonymous.status(), 401);

    let no_file = upload(&app, &token, &[Part::Text("postId", &post_id)]).await;
    assert_eq!(no_file.status(), 400);
    assert_eq!(no_file.error_code(), "MISSING_REQUIRED_FIELD");

    let not_multipart = AxumTestRequest::post("/api/images")
        .bearer(&token)
        .json(&json!({ "postId": post_id }))
        .send(app.app())
        .await;
    assert_eq!(not_multipart.status(), 400);
}

// ============================================================================
// Visibility and deletion
// ============================================================================

#[tokio::test]
async fn test_images_of_draft_posts_are_hidden() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &owner, "draft").await;
    let png = png_bytes(4, 4);

    let image: Value = upload(
        &app,
        &owner,
        &[Part::File("file", "a.png", &png), Part::Text("postId", &post_id)],
    )
    .await
    .json();
    let image_uri = format!("/api/images/{}", image["id"].as_str().unwrap());

    let anonymous = AxumTestRequest::get(&image_uri).send(app.app()).await;
    assert_eq!(anonymous.status(), 404);
    let anonymous_list = AxumTestRequest::get(&format!("/api/posts/{post_id}/images"))
        .send(app.app())
        .await;
    assert_eq!(anonymous_list.status(), 404);

    let as_owner = AxumTestRequest::get(&image_uri).bearer(&owner).send(app.app()).await;
    assert_eq!(as_owner.status(), 200);
}

#[tokio::test]
async fn test_delete_image_removes_files() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let (_, other) = create_test_user(&app.resources, "other@example.com", UserRole::User).await;
    let post_id = create_post(&app, &owner, "published").await;
    let png = png_bytes(16, 16);

    let image: Value = upload(
        &app,
        &owner,
        &[Part::File("file", "a.png", &png), Part::Text("postId", &post_id)],
    )
    .await
    .json();
    app.drain_jobs().await;
    assert_eq!(stored_file_count(&app.resources), 2);
    let image_uri = format!("/api/images/{}", image["id"].as_str().unwrap());

    let forbidden = AxumTestRequest::delete(&image_uri).bearer(&other).send(app.app()).await;
    assert_eq!(forbidden.status(), 403);

    let deleted = AxumTestRequest::delete(&image_uri).bearer(&owner).send(app.app()).await;
    assert_eq!(deleted.status(), 204);
    app.drain_jobs().await;

    assert_eq!(stored_file_count(&app.resources), 0);
    let gone = AxumTestRequest::get(&image_uri).bearer(&owner).send(app.app()).await;
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_deleting_post_cascades_to_images() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &owner, "published").await;
    let png = png_bytes(4, 4);

    for name in ["one.png", "two.png"] {
        upload(
            &app,
            &owner,
            &[Part::File("file", name, &png), Part::Text("postId", &post_id)],
        )
        .await
        .assert_status(axum::http::StatusCode::CREATED);
    }
    app.drain_jobs().await;
    assert_eq!(stored_file_count(&app.resources), 4);

    AxumTestRequest::delete(&format!("/api/posts/{post_id}"))
        .bearer(&owner)
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
    app.drain_jobs().await;

    assert_eq!(stored_file_count(&app.resources), 0);
    let post_uuid: Uuid = post_id.parse().unwrap();
    let remaining = app
        .resources
        .database
        .list_images(emporium_server::models::ImageParent::Post(post_uuid))
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_optimization_of_deleted_image_is_a_no_op() {
    let app = create_test_app().await;
    let (_, owner) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post_id = create_post(&app, &owner, "published").await;
    let png = png_bytes(4, 4);

    let image: Value = upload(
        &app,
        &owner,
        &[Part::File("file", "a.png", &png), Part::Text("postId", &post_id)],
    )
    .await
    .json();

    // Delete before the optimize job gets a chance to run
    AxumTestRequest::delete(&format!("/api/images/{}", image["id"].as_str().unwrap()))
        .bearer(&owner)
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
    app.drain_jobs().await;

    assert_eq!(stored_file_count(&app.resources), 0);
    assert_eq!(app.resources.jobs.pending().await.unwrap(), 0);
}
