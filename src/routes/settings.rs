// ABOUTME: Site settings route handlers exposing a public key/value map of JSON documents
// ABOUTME: Reads are cached; writes and deletes are restricted to administrators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::cache::{CacheKey, CacheNamespace};
use crate::errors::AppError;
use crate::models::Setting;
use crate::permissions::ensure_admin;
use crate::resources::ServerResources;
use crate::utils::extract::JsonBody;
use crate::utils::validation::validate_setting_key;

use super::{invalidate, require_auth};

/// Request body for writing a setting
#[derive(Debug, Deserialize)]
pub struct PutSettingBody {
    /// Any JSON value
    pub value: serde_json::Value,
}

/// Settings routes handler
pub struct SettingsRoutes;

impl SettingsRoutes {
    /// Create all settings routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/settings", get(Self::handle_list))
            .route(
                "/api/settings/:key",
                get(Self::handle_get)
                    .put(Self::handle_put)
                    .delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    /// Handle GET /api/settings
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let key = CacheKey::list(CacheNamespace::Settings, "all");
        if let Some(cached) = resources
            .cache
            .fetch::<BTreeMap<String, serde_json::Value>>(&key)
            .await
        {
            return Ok((StatusCode::OK, Json(cached)).into_response());
        }

        let settings: BTreeMap<String, serde_json::Value> = resources
            .database
            .list_settings()
            .await?
            .into_iter()
            .map(|setting| (setting.key, setting.value))
            .collect();
        resources.cache.store(&key, &settings).await;
        Ok((StatusCode::OK, Json(settings)).into_response())
    }

    /// Handle GET /api/settings/:key
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        Path(key): Path<String>,
    ) -> Result<Response, AppError> {
        validate_setting_key(&key)?;
        let cache_key = CacheKey::item(CacheNamespace::Settings, &key);
        if let Some(cached) = resources.cache.fetch::<Setting>(&cache_key).await {
            return Ok((StatusCode::OK, Json(cached)).into_response());
        }

        let setting = resources
            .database
            .get_setting(&key)
            .await?
            .ok_or_else(|| AppError::not_found("Setting").with_resource_id(key.clone()))?;
        resources.cache.store(&cache_key, &setting).await;
        Ok((StatusCode::OK, Json(setting)).into_response())
    }

    /// Handle PUT /api/settings/:key (admin)
    async fn handle_put(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(key): Path<String>,
        JsonBody(body): JsonBody<PutSettingBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        validate_setting_key(&key)?;
        ensure_admin(auth.role, "change settings")?;

        let setting = resources
            .database
            .upsert_setting(&key, &body.value, auth.user_id)
            .await?;

        invalidate(&resources, &[CacheNamespace::Settings]).await;
        Ok((StatusCode::OK, Json(setting)).into_response())
    }

    /// Handle DELETE /api/settings/:key (admin)
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(key): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        validate_setting_key(&key)?;
        ensure_admin(auth.role, "delete settings")?;

        if !resources.database.delete_setting(&key).await? {
            return Err(AppError::not_found("Setting").with_resource_id(key));
        }

        invalidate(&resources, &[CacheNamespace::Settings]).await;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
