// ABOUTME: Category route handlers for listing and administering post and product categories
// ABOUTME: Reads are public and cached; every mutation invalidates categories, posts and products
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::cache::{canonical_query, CacheKey, CacheNamespace};
use crate::constants::limits::{MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN};
use crate::errors::{AppError, AppResult};
use crate::models::{Category, CategoryKind};
use crate::permissions::ensure_admin;
use crate::resources::ServerResources;
use crate::utils::extract::{JsonBody, QueryParams};
use crate::utils::uuid::parse_path_id;
use crate::utils::validation::{optional_text, parse_choice, required_text, slugify};

use super::{invalidate, require_auth};

/// Namespaces whose cached payloads embed category data
const AFFECTED: [CacheNamespace; 3] = [
    CacheNamespace::Categories,
    CacheNamespace::Posts,
    CacheNamespace::Products,
];

/// Query parameters for listing categories
#[derive(Debug, Deserialize, Default)]
pub struct ListCategoriesQuery {
    /// `post` or `product`
    pub kind: Option<String>,
}

/// Request body for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryBody {
    /// Display name
    pub name: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// `post` (default) or `product`
    pub kind: Option<String>,
}

/// Request body for updating a category
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryBody {
    /// New name; the slug follows it
    pub name: Option<String>,
    /// New description; an empty string clears it
    pub description: Option<String>,
}

/// Category routes handler
pub struct CategoryRoutes;

impl CategoryRoutes {
    /// Create all category routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/categories",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/categories/:id",
                get(Self::handle_get)
                    .put(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    fn slug_for(name: &str) -> AppResult<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(
                AppError::invalid_input("Category name must contain letters or digits")
                    .with_details(json!({ "field": "name" })),
            );
        }
        Ok(slug)
    }

    async fn load(resources: &ServerResources, raw_id: &str) -> AppResult<Category> {
        let id = parse_path_id(raw_id, "Category")?;
        resources
            .database
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category").with_resource_id(id.to_string()))
    }

    /// Handle GET /api/categories
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        QueryParams(query): QueryParams<ListCategoriesQuery>,
    ) -> Result<Response, AppError> {
        let kind = query
            .kind
            .as_deref()
            .map(|raw| parse_choice::<CategoryKind>("kind", raw))
            .transpose()?;

        let key = CacheKey::list(
            CacheNamespace::Categories,
            canonical_query(&[("kind", kind.map(|k| k.as_str().to_owned()))]),
        );
        if let Some(cached) = resources.cache.fetch::<Vec<Category>>(&key).await {
            return Ok((StatusCode::OK, Json(cached)).into_response());
        }

        let categories = resources.database.list_categories(kind).await?;
        resources.cache.store(&key, &categories).await;
        Ok((StatusCode::OK, Json(categories)).into_response())
    }

    /// Handle GET /api/categories/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let category = Self::load(&resources, &id).await?;
        Ok((StatusCode::OK, Json(category)).into_response())
    }

    /// Handle POST /api/categories (admin)
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<CreateCategoryBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        ensure_admin(auth.role, "create categories")?;

        let name = required_text("name", body.name.as_deref(), MAX_CATEGORY_NAME_LEN)?;
        let slug = Self::slug_for(body.name.as_deref().unwrap_or_default())?;
        let description =
            optional_text("description", body.description.as_deref(), MAX_DESCRIPTION_LEN)?;
        let kind = body
            .kind
            .as_deref()
            .map(|raw| parse_choice::<CategoryKind>("kind", raw))
            .transpose()?
            .unwrap_or_default();

        let category = Category {
            id: Uuid::new_v4(),
            name,
            slug,
            description,
            kind,
            created_at: Utc::now(),
        };
        resources.database.create_category(&category).await?;

        invalidate(&resources, &AFFECTED).await;
        Ok((StatusCode::CREATED, Json(category)).into_response())
    }

    /// Handle PUT /api/categories/:id (admin)
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        JsonBody(body): JsonBody<UpdateCategoryBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        ensure_admin(auth.role, "update categories")?;

        let mut category = Self::load(&resources, &id).await?;
        if let Some(raw_name) = body.name.as_deref() {
            category.name = required_text("name", Some(raw_name), MAX_CATEGORY_NAME_LEN)?;
            category.slug = Self::slug_for(raw_name)?;
        }
        if let Some(raw_description) = body.description.as_deref() {
            category.description =
                optional_text("description", Some(raw_description), MAX_DESCRIPTION_LEN)?;
        }

        if !resources.database.update_category(&category).await? {
            return Err(AppError::not_found("Category"));
        }

        invalidate(&resources, &AFFECTED).await;
        Ok((StatusCode::OK, Json(category)).into_response())
    }

    /// Handle DELETE /api/categories/:id (admin)
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        ensure_admin(auth.role, "delete categories")?;

        let id = parse_path_id(&id, "Category")?;
        if !resources.database.delete_category(id).await? {
            return Err(AppError::not_found("Category").with_resource_id(id.to_string()));
        }

        invalidate(&resources, &AFFECTED).await;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
