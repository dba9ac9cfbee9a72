// ABOUTME: Image route handlers for multipart uploads attached to posts or products
// ABOUTME: Uploads are staged on disk first and removed again on every failing path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Image routes
//!
//! An upload is sniffed from its magic bytes, written to the media store
//! behind a [`StagedFile`](crate::media::StagedFile) guard, and only then
//! checked against its parent row. Any error after staging drops the guard,
//! which deletes the file. A successful upload enqueues the optimization job.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, multipart::MultipartRejection, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthResult;
use crate::constants::limits::MAX_ALT_TEXT_LEN;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::jobs::Job;
use crate::logging::AppLogger;
use crate::media::ImageKind;
use crate::models::{Image, ImageParent, ImageStatus};
use crate::permissions::ensure_owner_or_admin;
use crate::resources::ServerResources;
use crate::utils::uuid::{parse_optional_uuid, parse_path_id};
use crate::utils::validation::{optional_text, sanitize_file_name};

use super::{optional_auth, remove_files, require_auth};

/// Slack on top of the file size for multipart framing and text fields
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Raw fields of an upload form
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    post_id: Option<String>,
    product_id: Option<String>,
    alt: Option<String>,
}

/// Image routes handler
pub struct ImageRoutes;

impl ImageRoutes {
    /// Create all image routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let body_limit = resources
            .config
            .media
            .max_upload_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES);

        Router::new()
            .route("/api/images", post(Self::handle_upload))
            .route(
                "/api/images/:id",
                get(Self::handle_get).delete(Self::handle_delete),
            )
            .route("/api/posts/:id/images", get(Self::handle_list_for_post))
            .route(
                "/api/products/:id/images",
                get(Self::handle_list_for_product),
            )
            .layer(axum::extract::DefaultBodyLimit::max(body_limit))
            .with_state(resources)
    }

    fn too_large(max_bytes: usize) -> AppError {
        AppError::new(
            ErrorCode::PayloadTooLarge,
            format!("File exceeds the maximum upload size of {max_bytes} bytes"),
        )
        .with_details(json!({ "field": "file", "max_bytes": max_bytes }))
    }

    fn multipart_error(error: &MultipartError, max_bytes: usize) -> AppError {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::too_large(max_bytes)
        } else {
            AppError::new(
                ErrorCode::InvalidFormat,
                format!("Malformed multipart body: {}", error.body_text()),
            )
        }
    }

    /// Drain the multipart stream, enforcing the file size limit while reading
    async fn read_form(mut multipart: Multipart, max_bytes: usize) -> AppResult<UploadForm> {
        let mut form = UploadForm::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| Self::multipart_error(&e, max_bytes))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(str::to_owned);
                    let mut bytes = Vec::new();
                    while let Some(chunk) = field
                        .chunk()
                        .await
                        .map_err(|e| Self::multipart_error(&e, max_bytes))?
                    {
                        if bytes.len() + chunk.len() > max_bytes {
                            return Err(Self::too_large(max_bytes));
                        }
                        bytes.extend_from_slice(&chunk);
                    }
                    form.file = Some(bytes);
                }
                "postId" | "post_id" | "productId" | "product_id" | "alt" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| Self::multipart_error(&e, max_bytes))?;
                    match name.as_str() {
                        "postId" | "post_id" => form.post_id = Some(value),
                        "productId" | "product_id" => form.product_id = Some(value),
                        _ => form.alt = Some(value),
                    }
                }
                other => tracing::debug!(field = other, "Ignoring unknown upload field"),
            }
        }
        Ok(form)
    }

    /// Exactly one of `postId` / `productId`
    fn parse_parent(form: &UploadForm) -> AppResult<ImageParent> {
        let post_id = parse_optional_uuid(form.post_id.as_deref(), "postId")?;
        let product_id = parse_optional_uuid(form.product_id.as_deref(), "productId")?;
        match (post_id, product_id) {
            (Some(id), None) => Ok(ImageParent::Post(id)),
            (None, Some(id)) => Ok(ImageParent::Product(id)),
            (None, None) => Err(AppError::missing_field("postId")),
            (Some(_), Some(_)) => Err(AppError::invalid_input(
                "Provide either postId or productId, not both",
            )
            .with_details(json!({ "field": "postId" }))),
        }
    }

    /// Owner of the parent row and whether anonymous visitors may see it
    async fn parent_owner(
        resources: &ServerResources,
        parent: ImageParent,
    ) -> AppResult<(Uuid, bool)> {
        match parent {
            ImageParent::Post(id) => resources
                .database
                .get_post(id)
                .await?
                .map(|post| (post.author_id, post.is_public()))
                .ok_or_else(|| AppError::not_found("Post").with_resource_id(id.to_string())),
            ImageParent::Product(id) => resources
                .database
                .get_product(id)
                .await?
                .map(|product| (product.seller_id, product.is_public()))
                .ok_or_else(|| AppError::not_found("Product").with_resource_id(id.to_string())),
        }
    }

    /// Hidden parents look missing to callers who may not see them
    async fn ensure_parent_visible(
        resources: &ServerResources,
        parent: ImageParent,
        caller: Option<&AuthResult>,
    ) -> AppResult<()> {
        let (owner_id, public) = Self::parent_owner(resources, parent).await?;
        let visible = public
            || caller.is_some_and(|auth| auth.role.is_admin() || auth.user_id == owner_id);
        if visible {
            Ok(())
        } else {
            Err(match parent {
                ImageParent::Post(id) => AppError::not_found("Post").with_resource_id(id.to_string()),
                ImageParent::Product(id) => {
                    AppError::not_found("Product").with_resource_id(id.to_string())
                }
            })
        }
    }

    /// Handle POST /api/images (multipart)
    async fn handle_upload(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let multipart = multipart.map_err(|e| {
            AppError::new(
                ErrorCode::InvalidFormat,
                format!("Expected a multipart/form-data body: {}", e.body_text()),
            )
        })?;

        let max_bytes = resources.config.media.max_upload_bytes;
        let form = Self::read_form(multipart, max_bytes).await?;
        let bytes = form
            .file
            .as_deref()
            .ok_or_else(|| AppError::missing_field("file"))?;
        if bytes.is_empty() {
            return Err(AppError::invalid_input("Uploaded file is empty")
                .with_details(json!({ "field": "file" })));
        }
        let kind = ImageKind::sniff(bytes).ok_or_else(|| {
            AppError::new(
                ErrorCode::UnsupportedMediaType,
                "Only PNG, JPEG, GIF and WebP images are accepted",
            )
            .with_details(json!({ "field": "file" }))
        })?;

        // From here on the guard deletes the file on any early return
        let staged = resources.media.stage(bytes, kind).await?;

        let parent = Self::parse_parent(&form)?;
        let alt_text = optional_text("alt", form.alt.as_deref(), MAX_ALT_TEXT_LEN)?;
        let (owner_id, _) = Self::parent_owner(&resources, parent).await?;
        let resource = match parent {
            ImageParent::Post(_) => "post",
            ImageParent::Product(_) => "product",
        };
        ensure_owner_or_admin(auth.user_id, auth.role, owner_id, resource)?;

        let now = Utc::now();
        let image = Image {
            id: Uuid::new_v4(),
            owner_id: auth.user_id,
            parent,
            file_name: sanitize_file_name(form.file_name.as_deref().unwrap_or_default()),
            original_path: staged.relative_path().to_owned(),
            optimized_path: None,
            mime_type: kind.mime_type().to_owned(),
            size_bytes: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
            optimized_size_bytes: None,
            width: None,
            height: None,
            alt_text,
            status: ImageStatus::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        resources.database.create_image(&image).await?;
        staged.commit();

        AppLogger::log_upload(
            &auth.user_id.to_string(),
            &image.id.to_string(),
            &image.mime_type,
            bytes.len(),
        );
        resources
            .jobs
            .dispatch(Job::OptimizeImage { image_id: image.id })
            .await;
        Ok((StatusCode::CREATED, Json(image)).into_response())
    }

    /// Handle GET /api/images/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let caller = optional_auth(&resources, &headers)?;
        let id = parse_path_id(&id, "Image")?;
        let image = resources
            .database
            .get_image(id)
            .await?
            .ok_or_else(|| AppError::not_found("Image").with_resource_id(id.to_string()))?;
        Self::ensure_parent_visible(&resources, image.parent, caller.as_ref())
            .await
            .map_err(|_| AppError::not_found("Image").with_resource_id(id.to_string()))?;
        Ok((StatusCode::OK, Json(image)).into_response())
    }

    async fn list_for(
        resources: &ServerResources,
        headers: &HeaderMap,
        parent: ImageParent,
    ) -> AppResult<Response> {
        let caller = optional_auth(resources, headers)?;
        Self::ensure_parent_visible(resources, parent, caller.as_ref()).await?;
        let images = resources.database.list_images(parent).await?;
        Ok((StatusCode::OK, Json(images)).into_response())
    }

    /// Handle GET /api/posts/:id/images
    async fn handle_list_for_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let id = parse_path_id(&id, "Post")?;
        Self::list_for(&resources, &headers, ImageParent::Post(id)).await
    }

    /// Handle GET /api/products/:id/images
    async fn handle_list_for_product(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let id = parse_path_id(&id, "Product")?;
        Self::list_for(&resources, &headers, ImageParent::Product(id)).await
    }

    /// Handle DELETE /api/images/:id
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let id = parse_path_id(&id, "Image")?;
        let image = resources
            .database
            .get_image(id)
            .await?
            .ok_or_else(|| AppError::not_found("Image").with_resource_id(id.to_string()))?;
        ensure_owner_or_admin(auth.user_id, auth.role, image.owner_id, "image")?;

        if !resources.database.delete_image(image.id).await? {
            return Err(AppError::not_found("Image").with_resource_id(id.to_string()));
        }

        remove_files(&resources, image.stored_paths()).await;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
