// ABOUTME: Centralized resource container shared by every HTTP handler and job worker
// ABOUTME: Builds the database, auth, cache, job queue and media store once at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Server Resources
//!
//! Handlers receive `State<Arc<ServerResources>>`. Everything expensive is
//! created here exactly once and shared through `Arc`.

use std::sync::Arc;

use crate::auth::AuthManager;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::jobs::{JobQueue, JobRunner};
use crate::media::MediaStore;
use crate::middleware::AuthMiddleware;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Relational store
    pub database: Arc<Database>,
    /// Session token issuer
    pub auth_manager: Arc<AuthManager>,
    /// Request authentication
    pub auth_middleware: Arc<AuthMiddleware>,
    /// Response cache
    pub cache: Arc<Cache>,
    /// Background job queue
    pub jobs: Arc<JobQueue>,
    /// Upload storage
    pub media: Arc<MediaStore>,
    /// Immutable configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Wire already constructed components together
    #[must_use]
    pub fn new(
        database: Database,
        cache: Cache,
        jobs: JobQueue,
        media: MediaStore,
        config: Arc<ServerConfig>,
    ) -> Self {
        let auth_manager = AuthManager::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.jwt_expiry_hours,
        );
        let auth_middleware = AuthMiddleware::new(auth_manager.clone());

        Self {
            database: Arc::new(database),
            auth_manager: Arc::new(auth_manager),
            auth_middleware: Arc::new(auth_middleware),
            cache: Arc::new(cache),
            jobs: Arc::new(jobs),
            media: Arc::new(media),
            config,
        }
    }

    /// Connect every backend described by `config` and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the database, cache, queue or upload directory
    /// cannot be initialized
    pub async fn initialize(config: ServerConfig) -> AppResult<Self> {
        let database = Database::new(&config.database.url).await?;
        database.migrate().await?;

        let cache = Cache::new(config.cache.clone()).await?;
        let jobs = JobQueue::new(config.jobs.clone()).await?;
        let media = MediaStore::open(&config.media).await?;

        Ok(Self::new(database, cache, jobs, media, Arc::new(config)))
    }

    /// Runner executing jobs against these resources
    #[must_use]
    pub fn job_runner(&self) -> JobRunner {
        JobRunner::new(
            self.database.as_ref().clone(),
            self.cache.as_ref().clone(),
            self.media.as_ref().clone(),
            self.config.media.image_max_width,
        )
    }
}
