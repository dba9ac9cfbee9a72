// ABOUTME: Post route handlers for listing, reading, creating, updating and deleting posts
// ABOUTME: Anonymous reads see published posts only and are served from the response cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Post routes
//!
//! Only anonymous responses are cached: signed-in callers may see their own
//! drafts, so their list payloads differ from the public one.

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
use uuid::Uuid;

use crate::auth::AuthResult;
use crate::cache::{canonical_query, CacheKey, CacheNamespace};
use crate::constants::limits::{MAX_CONTENT_LEN, MAX_TITLE_LEN};
use crate::database::PostFilter;
use crate::errors::{AppError, AppResult};
use crate::models::{CategoryKind, ImageParent, Post, PostStatus, PostType};
use crate::pagination::{Page, PageParams};
use crate::permissions::ensure_owner_or_admin;
use crate::resources::ServerResources;
use crate::utils::extract::{JsonBody, QueryParams};
use crate::utils::uuid::{parse_optional_uuid, parse_path_id};
use crate::utils::validation::{
    make_excerpt, normalize_tags, parse_choice, required_text, slugify,
};

use super::{
    invalidate, optional_auth, remove_files, require_auth, resolve_category, unique_slug,
    visibility_for, SlugTable,
};

/// Query parameters for listing posts
#[derive(Debug, Deserialize, Default)]
pub struct ListPostsQuery {
    /// Category id or slug
    pub category: Option<String>,
    /// Tag name or slug
    pub tag: Option<String>,
    /// `article`, `news` or `page`
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    /// Author id
    pub author: Option<String>,
    /// `draft` or `published`
    pub status: Option<String>,
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// Request body for creating a post
#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
    /// Title, 1..=200 characters
    pub title: Option<String>,
    /// Body, 1..=100 000 characters
    pub content: Option<String>,
    /// Category id or slug of kind `post`
    pub category: Option<String>,
    /// `article` (default), `news` or `page`
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    /// Tag names
    #[serde(default)]
    pub tags: Vec<String>,
    /// `draft` (default) or `published`
    pub status: Option<String>,
}

/// Request body for a partial post update
#[derive(Debug, Deserialize)]
pub struct UpdatePostBody {
    /// New title
    pub title: Option<String>,
    /// New content
    pub content: Option<String>,
    /// New category; an empty string clears it
    pub category: Option<String>,
    /// New type
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    /// Replacement tag set
    pub tags: Option<Vec<String>>,
    /// New status
    pub status: Option<String>,
}

/// Post routes handler
pub struct PostRoutes;

impl PostRoutes {
    /// Create all post routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/posts", get(Self::handle_list).post(Self::handle_create))
            .route(
                "/api/posts/:id",
                get(Self::handle_get)
                    .put(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    /// Fetch a post the caller may read; hidden drafts look missing
    async fn load_visible(
        resources: &ServerResources,
        raw_id: &str,
        caller: Option<&AuthResult>,
    ) -> AppResult<Post> {
        let id = parse_path_id(raw_id, "Post")?;
        let post = resources
            .database
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("Post").with_resource_id(id.to_string()))?;

        let readable = post.is_public()
            || caller.is_some_and(|auth| auth.role.is_admin() || auth.user_id == post.author_id);
        if readable {
            Ok(post)
        } else {
            Err(AppError::not_found("Post").with_resource_id(id.to_string()))
        }
    }

    /// Fetch a post the caller may modify
    async fn load_owned(
        resources: &ServerResources,
        raw_id: &str,
        auth: &AuthResult,
    ) -> AppResult<Post> {
        let id = parse_path_id(raw_id, "Post")?;
        let post = resources
            .database
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("Post").with_resource_id(id.to_string()))?;
        ensure_owner_or_admin(auth.user_id, auth.role, post.author_id, "post")?;
        Ok(post)
    }

    /// Handle GET /api/posts
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        QueryParams(query): QueryParams<ListPostsQuery>,
    ) -> Result<Response, AppError> {
        let caller = optional_auth(&resources, &headers)?;
        let page = PageParams::new(query.limit, query.offset);

        let post_type = query
            .post_type
            .as_deref()
            .map(|raw| parse_choice::<PostType>("type", raw))
            .transpose()?;
        let status = query
            .status
            .as_deref()
            .map(|raw| parse_choice::<PostStatus>("status", raw))
            .transpose()?;
        let author_id = parse_optional_uuid(query.author.as_deref(), "author")?;
        let tag = query.tag.as_deref().map(slugify).filter(|t| !t.is_empty());

        let cache_key = caller.is_none().then(|| {
            CacheKey::list(
                CacheNamespace::Posts,
                canonical_query(&[
                    ("category", query.category.clone()),
                    ("tag", tag.clone()),
                    ("type", post_type.map(|t| t.as_str().to_owned())),
                    ("author", author_id.map(|id| id.to_string())),
                    ("status", status.map(|s| s.as_str().to_owned())),
                    ("limit", Some(page.limit.to_string())),
                    ("offset", Some(page.offset.to_string())),
                ]),
            )
        });
        if let Some(key) = &cache_key {
            if let Some(cached) = resources.cache.fetch::<Page<Post>>(key).await {
                return Ok((StatusCode::OK, Json(cached)).into_response());
            }
        }

        let category_id = match query.category.as_deref().map(str::trim) {
            Some(reference) if !reference.is_empty() => {
                let found = resources
                    .database
                    .find_category(reference, CategoryKind::Post)
                    .await?;
                let Some(category) = found else {
                    // Nothing can match an unknown category
                    let empty = Page::<Post>::new(Vec::new(), 0, page);
                    return Ok((StatusCode::OK, Json(empty)).into_response());
                };
                Some(category.id)
            }
            _ => None,
        };

        let filter = PostFilter {
            category_id,
            tag,
            post_type,
            author_id,
            status,
            visibility: visibility_for(caller.as_ref()),
        };
        let (posts, total) = resources.database.list_posts(&filter, page).await?;
        let body = Page::new(posts, total, page);

        if let Some(key) = &cache_key {
            resources.cache.store(key, &body).await;
        }
        Ok((StatusCode::OK, Json(body)).into_response())
    }

    /// Handle GET /api/posts/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let caller = optional_auth(&resources, &headers)?;

        if caller.is_none() {
            let key = CacheKey::item(CacheNamespace::Posts, id.trim());
            if let Some(cached) = resources.cache.fetch::<Post>(&key).await {
                return Ok((StatusCode::OK, Json(cached)).into_response());
            }
            let post = Self::load_visible(&resources, &id, None).await?;
            resources.cache.store(&key, &post).await;
            return Ok((StatusCode::OK, Json(post)).into_response());
        }

        let post = Self::load_visible(&resources, &id, caller.as_ref()).await?;
        Ok((StatusCode::OK, Json(post)).into_response())
    }

    /// Handle POST /api/posts
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<CreatePostBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;

        let title = required_text("title", body.title.as_deref(), MAX_TITLE_LEN)?;
        let content = required_text("content", body.content.as_deref(), MAX_CONTENT_LEN)?;
        let post_type = body
            .post_type
            .as_deref()
            .map(|raw| parse_choice::<PostType>("type", raw))
            .transpose()?
            .unwrap_or_default();
        let status = body
            .status
            .as_deref()
            .map(|raw| parse_choice::<PostStatus>("status", raw))
            .transpose()?
            .unwrap_or_default();
        let tags = normalize_tags(&body.tags)?;

        let category_id =
            resolve_category(&resources, body.category.as_deref(), CategoryKind::Post).await?;
        let slug = unique_slug(
            &resources,
            SlugTable::Posts,
            body.title.as_deref().unwrap_or_default(),
        )
        .await?;

        let now = Utc::now();
        let draft = Post {
            id: Uuid::new_v4(),
            author_id: auth.user_id,
            category_id,
            title,
            slug,
            excerpt: make_excerpt(body.content.as_deref().unwrap_or_default()),
            content,
            post_type,
            status,
            published_at: (status == PostStatus::Published).then_some(now),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let post = resources.database.create_post(&draft, &tags).await?;

        invalidate(&resources, &[CacheNamespace::Posts, CacheNamespace::Tags]).await;
        Ok((StatusCode::CREATED, Json(post)).into_response())
    }

    /// Handle PUT /api/posts/:id
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        JsonBody(body): JsonBody<UpdatePostBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;

        let title = body
            .title
            .as_deref()
            .map(|raw| required_text("title", Some(raw), MAX_TITLE_LEN))
            .transpose()?;
        let content = body
            .content
            .as_deref()
            .map(|raw| required_text("content", Some(raw), MAX_CONTENT_LEN))
            .transpose()?;
        let post_type = body
            .post_type
            .as_deref()
            .map(|raw| parse_choice::<PostType>("type", raw))
            .transpose()?;
        let status = body
            .status
            .as_deref()
            .map(|raw| parse_choice::<PostStatus>("status", raw))
            .transpose()?;
        let tags = body.tags.as_deref().map(normalize_tags).transpose()?;

        let mut post = Self::load_owned(&resources, &id, &auth).await?;
        if body.category.is_some() {
            post.category_id =
                resolve_category(&resources, body.category.as_deref(), CategoryKind::Post).await?;
        }

        if let Some(title) = title {
            post.title = title;
        }
        if let Some(content) = content {
            post.content = content;
            post.excerpt = make_excerpt(body.content.as_deref().unwrap_or_default());
        }
        if let Some(post_type) = post_type {
            post.post_type = post_type;
        }
        let now = Utc::now();
        if let Some(status) = status {
            post.status = status;
            if status == PostStatus::Published && post.published_at.is_none() {
                post.published_at = Some(now);
            }
        }
        post.updated_at = now;

        let post = resources.database.update_post(&post, tags.as_deref()).await?;

        invalidate(&resources, &[CacheNamespace::Posts, CacheNamespace::Tags]).await;
        Ok((StatusCode::OK, Json(post)).into_response())
    }

    /// Handle DELETE /api/posts/:id
    ///
    /// Image rows cascade with the post; their files are removed by a job.
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let post = Self::load_owned(&resources, &id, &auth).await?;

        let images = resources
            .database
            .list_images(ImageParent::Post(post.id))
            .await?;
        if !resources.database.delete_post(post.id).await? {
            return Err(AppError::not_found("Post").with_resource_id(post.id.to_string()));
        }

        remove_files(
            &resources,
            images.iter().flat_map(|image| image.stored_paths()).collect(),
        )
        .await;
        invalidate(&resources, &[CacheNamespace::Posts]).await;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
