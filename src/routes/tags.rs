// ABOUTME: Tag route handlers; tags are created implicitly by posts and products
// ABOUTME: Provides the cached public tag list and admin deletion with cascading join cleanup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};

use crate::cache::{CacheKey, CacheNamespace};
use crate::errors::AppError;
use crate::models::Tag;
use crate::permissions::ensure_admin;
use crate::resources::ServerResources;
use crate::utils::uuid::parse_path_id;

use super::{invalidate, require_auth};

/// Tag routes handler
pub struct TagRoutes;

impl TagRoutes {
    /// Create all tag routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/tags", get(Self::handle_list))
            .route("/api/tags/:id", delete(Self::handle_delete))
            .with_state(resources)
    }

    /// Handle GET /api/tags
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let key = CacheKey::list(CacheNamespace::Tags, "all");
        if let Some(cached) = resources.cache.fetch::<Vec<Tag>>(&key).await {
            return Ok((StatusCode::OK, Json(cached)).into_response());
        }

        let tags = resources.database.list_tags().await?;
        resources.cache.store(&key, &tags).await;
        Ok((StatusCode::OK, Json(tags)).into_response())
    }

    /// Handle DELETE /api/tags/:id (admin)
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        ensure_admin(auth.role, "delete tags")?;

        let id = parse_path_id(&id, "Tag")?;
        if !resources.database.delete_tag(id).await? {
            return Err(AppError::not_found("Tag").with_resource_id(id.to_string()));
        }

        invalidate(
            &resources,
            &[
                CacheNamespace::Tags,
                CacheNamespace::Posts,
                CacheNamespace::Products,
            ],
        )
        .await;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
