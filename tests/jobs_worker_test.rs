// ABOUTME: Integration tests for background job processing
// ABOUTME: Covers retry scheduling with backoff, exhaustion handling and the worker pool lifecycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::time::Duration;

use common::{create_test_app, create_test_app_with, create_test_user, png_bytes, TestApp};
use emporium_server::cache::{CacheKey, CacheNamespace};
use emporium_server::jobs::worker::{process_one, JobOutcome};
use emporium_server::jobs::{Job, JobWorkerPool, RetryPolicy};
use emporium_server::models::{Image, ImageStatus};
use emporium_server::permissions::UserRole;
use helpers::axum_test::{AxumTestRequest, Part};
use serde_json::{json, Value};
use uuid::Uuid;

/// Upload a PNG to a fresh post and return the stored row, leaving the
/// optimize job queued and every other job drained
async fn uploaded_image(app: &TestApp) -> Image {
    let (_, token) = create_test_user(&app.resources, "owner@example.com", UserRole::User).await;
    let post: Value = AxumTestRequest::post("/api/posts")
        .bearer(&token)
        .json(&json!({ "title": "Photos", "content": "c", "status": "published" }))
        .send(app.app())
        .await
        .json();
    app.drain_jobs().await;

    let png = png_bytes(32, 32);
    let image: Value = AxumTestRequest::post("/api/images")
        .bearer(&token)
        .multipart(&[
            Part::File("file", "photo.png", &png),
            Part::Text("postId", post["id"].as_str().unwrap()),
        ])
        .send(app.app())
        .await
        .assert_status(axum::http::StatusCode::CREATED)
        .json();
    let id: Uuid = image["id"].as_str().unwrap().parse().unwrap();
    app.resources.database.get_image(id).await.unwrap().unwrap()
}

async fn run_next(app: &TestApp) -> Option<JobOutcome> {
    let runner = app.resources.job_runner();
    let policy = RetryPolicy::from_config(&app.resources.config.jobs);
    process_one(&app.resources.jobs, &runner, &policy).await.unwrap()
}

#[tokio::test]
async fn test_failed_job_is_rescheduled_with_backoff() {
    let app = create_test_app().await;
    let image = uploaded_image(&app).await;
    app.resources
        .media
        .write(&image.original_path, b"not a png any more")
        .await
        .unwrap();

    let outcome = run_next(&app).await;
    assert_eq!(outcome, Some(JobOutcome::Retrying(Duration::from_millis(1000))));

    // The retry waits for its backoff, so nothing is due right now
    assert_eq!(run_next(&app).await, None);
    let queued = app.resources.jobs.snapshot().await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempt, 2);
    assert!(queued[0].last_error.is_some());

    let stored = app.resources.database.get_image(image.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ImageStatus::Pending);
}

#[tokio::test]
async fn test_retry_succeeds_once_the_cause_is_gone() {
    let app = create_test_app_with(|config| config.jobs.backoff_ms = 10).await;
    let image = uploaded_image(&app).await;
    let original = app.resources.media.read(&image.original_path).await.unwrap();
    app.resources
        .media
        .write(&image.original_path, b"truncated")
        .await
        .unwrap();

    assert!(matches!(run_next(&app).await, Some(JobOutcome::Retrying(_))));

    app.resources
        .media
        .write(&image.original_path, &original)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(run_next(&app).await, Some(JobOutcome::Succeeded));
    let stored = app.resources.database.get_image(image.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ImageStatus::Ready);
}

#[tokio::test]
async fn test_exhausted_optimization_marks_image_failed() {
    let app = create_test_app_with(|config| {
        config.jobs.max_attempts = 2;
        config.jobs.backoff_ms = 10;
    })
    .await;
    let image = uploaded_image(&app).await;
    app.resources.media.remove(&image.original_path).await.unwrap();

    assert!(matches!(run_next(&app).await, Some(JobOutcome::Retrying(_))));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(run_next(&app).await, Some(JobOutcome::Exhausted));

    let stored = app.resources.database.get_image(image.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ImageStatus::Failed);
    assert!(stored.last_error.is_some());
    assert_eq!(app.resources.jobs.pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_worker_pool_processes_and_stops() {
    let app = create_test_app().await;
    let key = CacheKey::list(CacheNamespace::Tags, "all");
    app.resources.cache.store(&key, &vec!["cached"]).await;
    assert!(app.resources.cache.exists(&key).await.unwrap());

    let pool = JobWorkerPool::start(
        app.resources.jobs.as_ref().clone(),
        app.resources.job_runner(),
        RetryPolicy::from_config(&app.resources.config.jobs),
        2,
        Duration::from_millis(10),
    );
    assert_eq!(pool.size(), 2);

    app.resources
        .jobs
        .enqueue(Job::invalidate(CacheNamespace::Tags))
        .await
        .unwrap();

    let mut cleared = false;
    for _ in 0..100 {
        if !app.resources.cache.exists(&key).await.unwrap() {
            cleared = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.shutdown().await;

    assert!(cleared, "worker pool never ran the invalidation job");
    assert_eq!(app.resources.jobs.pending().await.unwrap(), 0);
}
