// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory resources, user/session creation and job draining helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `emporium_server`
//!
//! Every test gets its own in-memory database, in-memory cache and queue,
//! and a temporary upload directory that disappears with the [`TestApp`].

use std::io::Cursor;
use std::sync::{Arc, Once};

use axum::Router;
use emporium_server::{
    auth::hash_password,
    cache::Cache,
    config::{DatabaseUrl, ServerConfig},
    database::Database,
    jobs::{worker::process_one, JobQueue, RetryPolicy},
    media::MediaStore,
    models::User,
    permissions::UserRole,
    resources::ServerResources,
    server::EmporiumServer,
};
use tempfile::TempDir;

static INIT_LOGGER: Once = Once::new();

/// Password given to every user created by [`create_test_user`]
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// A fully wired application over throwaway backends
pub struct TestApp {
    pub resources: Arc<ServerResources>,
    pub router: Router,
    _uploads: TempDir,
}

impl TestApp {
    /// A fresh clone of the router for one request
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Run queued jobs until none is due; returns how many were processed
    pub async fn drain_jobs(&self) -> usize {
        let runner = self.resources.job_runner();
        let policy = RetryPolicy::from_config(&self.resources.config.jobs);
        let mut processed = 0;
        while process_one(&self.resources.jobs, &runner, &policy)
            .await
            .expect("job queue failed")
            .is_some()
        {
            processed += 1;
        }
        processed
    }
}

/// Test configuration: in-memory database, no background cache sweeper
pub fn test_config(upload_dir: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.database.url = DatabaseUrl::Memory;
    config.auth.jwt_secret = "test-secret-test-secret-test-secret-0123".to_owned();
    config.cache.enable_background_cleanup = false;
    config.media.upload_dir = upload_dir.to_path_buf();
    config
}

/// Build resources and the router with a customised configuration
pub async fn create_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    init_test_logging();
    let uploads = TempDir::new().expect("temp upload dir");
    let mut config = test_config(uploads.path());
    configure(&mut config);

    let database = Database::new(&config.database.url)
        .await
        .expect("in-memory database");
    let cache = Cache::new(config.cache.clone()).await.expect("cache");
    let jobs = JobQueue::new(config.jobs.clone()).await.expect("job queue");
    let media = MediaStore::open(&config.media).await.expect("media store");

    let resources = Arc::new(ServerResources::new(
        database,
        cache,
        jobs,
        media,
        Arc::new(config),
    ));
    let router = EmporiumServer::new(Arc::clone(&resources)).router();

    TestApp {
        resources,
        router,
        _uploads: uploads,
    }
}

/// Build resources and the router with the default test configuration
pub async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}).await
}

/// Create a user directly in the database and sign a session for it
pub async fn create_test_user(
    resources: &ServerResources,
    email: &str,
    role: UserRole,
) -> (User, String) {
    let password_hash = hash_password(TEST_PASSWORD.to_owned())
        .await
        .expect("hash password");
    let mut user = User::new(email.to_owned(), password_hash, None);
    user.role = role;
    let user = resources
        .database
        .create_user(&user)
        .await
        .expect("create user");
    let session = resources
        .auth_manager
        .generate_token(&user)
        .expect("sign session");
    (user, session.token)
}

/// Encode a solid-colour PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// Number of files currently stored under the upload directory
pub fn stored_file_count(resources: &ServerResources) -> usize {
    fn count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map_or(0, |entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        count(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
    }
    count(resources.media.root())
}
