// ABOUTME: Executes background job payloads against the database, cache and media store
// ABOUTME: Image optimization runs the CPU-heavy work on the blocking thread pool
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{Job, JobEnvelope};
use crate::cache::Cache;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::media::{optimized_path_for, optimizer, ImageKind, MediaStore};
use crate::models::ImageStatus;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Executes jobs; cheap to clone and shared by every worker
#[derive(Clone)]
pub struct JobRunner {
    database: Database,
    cache: Cache,
    media: MediaStore,
    image_max_width: u32,
}

impl JobRunner {
    /// Create a runner over shared resources
    #[must_use]
    pub const fn new(
        database: Database,
        cache: Cache,
        media: MediaStore,
        image_max_width: u32,
    ) -> Self {
        Self {
            database,
            cache,
            media,
            image_max_width,
        }
    }

    /// Run one delivery of a job
    ///
    /// # Errors
    ///
    /// Returns the failure that should trigger a retry
    pub async fn run(&self, job: &Job) -> AppResult<()> {
        match job {
            Job::OptimizeImage { image_id } => self.optimize_image(*image_id).await,
            Job::InvalidateCache { pattern } => {
                let removed = self.cache.invalidate_pattern(pattern).await?;
                debug!(pattern = %pattern, removed, "Cache entries invalidated");
                Ok(())
            }
            Job::RemoveFiles { paths } => {
                for path in paths {
                    self.media.remove(path).await?;
                }
                Ok(())
            }
        }
    }

    /// Handle a job that failed its last attempt
    ///
    /// # Errors
    ///
    /// Returns an error if recording the failure fails
    pub async fn on_exhausted(&self, envelope: &JobEnvelope, error: &AppError) -> AppResult<()> {
        if let Job::OptimizeImage { image_id } = envelope.job {
            let recorded = self
                .database
                .mark_image_failed(image_id, &error.message)
                .await?;
            if recorded {
                warn!(image_id = %image_id, "Image optimization abandoned: {}", error.message);
            }
        }
        Ok(())
    }

    async fn optimize_image(&self, image_id: Uuid) -> AppResult<()> {
        let Some(image) = self.database.get_image(image_id).await? else {
            debug!(image_id = %image_id, "Image deleted before optimization; skipping");
            return Ok(());
        };
        if image.status == ImageStatus::Ready {
            return Ok(());
        }

        let original = self.media.read(&image.original_path).await?;
        let kind = ImageKind::from_extension(&image.original_path)
            .or_else(|| ImageKind::sniff(&original))
            .ok_or_else(|| {
                AppError::storage(format!("Unknown image type for {}", image.original_path))
            })?;

        let max_width = self.image_max_width;
        let optimized =
            tokio::task::spawn_blocking(move || optimizer::optimize(&original, kind, max_width))
                .await
                .map_err(|e| AppError::internal(format!("Optimizer task failed: {e}")))??;

        let optimized_path = optimized_path_for(&image.original_path);
        self.media.write(&optimized_path, &optimized.bytes).await?;

        let size = i64::try_from(optimized.bytes.len()).unwrap_or(i64::MAX);
        match self
            .database
            .mark_image_ready(
                image_id,
                &optimized_path,
                size,
                i64::from(optimized.width),
                i64::from(optimized.height),
            )
            .await
        {
            Ok(()) => {
                info!(
                    image_id = %image_id,
                    width = optimized.width,
                    height = optimized.height,
                    bytes = size,
                    "Image optimized"
                );
                Ok(())
            }
            Err(e) if e.code == crate::errors::ErrorCode::ResourceNotFound => {
                // Deleted while we were encoding; the variant is now orphaned
                self.media.remove(&optimized_path).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
