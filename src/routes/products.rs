// ABOUTME: Product route handlers for the catalogue: list, read, create, update and delete
// ABOUTME: Anonymous reads see active products only; prices are integer minor units
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
use uuid::Uuid;

use crate::auth::AuthResult;
use crate::cache::{canonical_query, CacheKey, CacheNamespace};
use crate::constants::limits::{MAX_BODY_LEN, MAX_TITLE_LEN};
use crate::database::ProductFilter;
use crate::errors::{AppError, AppResult};
use crate::models::{CategoryKind, ImageParent, Product, ProductStatus};
use crate::pagination::{Page, PageParams};
use crate::permissions::ensure_owner_or_admin;
use crate::resources::ServerResources;
use crate::utils::extract::{JsonBody, QueryParams};
use crate::utils::uuid::{parse_optional_uuid, parse_path_id};
use crate::utils::validation::{
    non_negative, normalize_currency, normalize_tags, parse_choice, required_text, slugify,
};

use super::{
    invalidate, optional_auth, remove_files, require_auth, resolve_category, unique_slug,
    visibility_for, SlugTable,
};

/// Setting holding the store currency used when a product names none
pub const CURRENCY_SETTING_KEY: &str = "store.currency";
/// Currency used when the setting is absent
const FALLBACK_CURRENCY: &str = "USD";

/// Query parameters for listing products
#[derive(Debug, Deserialize, Default)]
pub struct ListProductsQuery {
    /// Category id or slug
    pub category: Option<String>,
    /// Tag name or slug
    pub tag: Option<String>,
    /// Seller id
    pub seller: Option<String>,
    /// `draft`, `active` or `archived`
    pub status: Option<String>,
    /// Only products with stock left
    pub in_stock: Option<bool>,
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// Request body for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductBody {
    /// Title, 1..=200 characters
    pub title: Option<String>,
    /// Description, 1..=20 000 characters
    pub body: Option<String>,
    /// Category id or slug of kind `product`
    pub category: Option<String>,
    /// Unit price in minor units
    pub price_cents: Option<i64>,
    /// ISO 4217 code; defaults to the store currency
    pub currency: Option<String>,
    /// Units available (default 0)
    pub stock: Option<i64>,
    /// Tag names
    #[serde(default)]
    pub tags: Vec<String>,
    /// `draft` (default), `active` or `archived`
    pub status: Option<String>,
}

/// Request body for a partial product update
#[derive(Debug, Deserialize)]
pub struct UpdateProductBody {
    /// New title
    pub title: Option<String>,
    /// New description
    pub body: Option<String>,
    /// New category; an empty string clears it
    pub category: Option<String>,
    /// New price
    pub price_cents: Option<i64>,
    /// New currency
    pub currency: Option<String>,
    /// New stock level
    pub stock: Option<i64>,
    /// Replacement tag set
    pub tags: Option<Vec<String>>,
    /// New status
    pub status: Option<String>,
}

/// Product routes handler
pub struct ProductRoutes;

impl ProductRoutes {
    /// Create all product routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/products",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/products/:id",
                get(Self::handle_get)
                    .put(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    /// Store currency from settings, falling back to USD
    async fn default_currency(resources: &ServerResources) -> AppResult<String> {
        let configured = resources
            .database
            .get_setting(CURRENCY_SETTING_KEY)
            .await?
            .and_then(|setting| setting.value.as_str().map(str::to_owned));
        match configured {
            Some(code) => normalize_currency(&code),
            None => Ok(FALLBACK_CURRENCY.to_owned()),
        }
    }

    async fn load_visible(
        resources: &ServerResources,
        raw_id: &str,
        caller: Option<&AuthResult>,
    ) -> AppResult<Product> {
        let id = parse_path_id(raw_id, "Product")?;
        let product = resources
            .database
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product").with_resource_id(id.to_string()))?;

        let readable = product.is_public()
            || caller.is_some_and(|auth| auth.role.is_admin() || auth.user_id == product.seller_id);
        if readable {
            Ok(product)
        } else {
            Err(AppError::not_found("Product").with_resource_id(id.to_string()))
        }
    }

    async fn load_owned(
        resources: &ServerResources,
        raw_id: &str,
        auth: &AuthResult,
    ) -> AppResult<Product> {
        let id = parse_path_id(raw_id, "Product")?;
        let product = resources
            .database
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product").with_resource_id(id.to_string()))?;
        ensure_owner_or_admin(auth.user_id, auth.role, product.seller_id, "product")?;
        Ok(product)
    }

    /// Handle GET /api/products
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        QueryParams(query): QueryParams<ListProductsQuery>,
    ) -> Result<Response, AppError> {
        let caller = optional_auth(&resources, &headers)?;
        let page = PageParams::new(query.limit, query.offset);

        let status = query
            .status
            .as_deref()
            .map(|raw| parse_choice::<ProductStatus>("status", raw))
            .transpose()?;
        let seller_id = parse_optional_uuid(query.seller.as_deref(), "seller")?;
        let tag = query.tag.as_deref().map(slugify).filter(|t| !t.is_empty());
        let in_stock = query.in_stock.unwrap_or(false);

        let cache_key = caller.is_none().then(|| {
            CacheKey::list(
                CacheNamespace::Products,
                canonical_query(&[
                    ("category", query.category.clone()),
                    ("tag", tag.clone()),
                    ("seller", seller_id.map(|id| id.to_string())),
                    ("status", status.map(|s| s.as_str().to_owned())),
                    ("in_stock", in_stock.then(|| "true".to_owned())),
                    ("limit", Some(page.limit.to_string())),
                    ("offset", Some(page.offset.to_string())),
                ]),
            )
        });
        if let Some(key) = &cache_key {
            if let Some(cached) = resources.cache.fetch::<Page<Product>>(key).await {
                return Ok((StatusCode::OK, Json(cached)).into_response());
            }
        }

        let category_id = match query.category.as_deref().map(str::trim) {
            Some(reference) if !reference.is_empty() => {
                let found = resources
                    .database
                    .find_category(reference, CategoryKind::Product)
                    .await?;
                let Some(category) = found else {
                    let empty = Page::<Product>::new(Vec::new(), 0, page);
                    return Ok((StatusCode::OK, Json(empty)).into_response());
                };
                Some(category.id)
            }
            _ => None,
        };

        let filter = ProductFilter {
            category_id,
            tag,
            seller_id,
            status,
            in_stock,
            visibility: visibility_for(caller.as_ref()),
        };
        let (products, total) = resources.database.list_products(&filter, page).await?;
        let body = Page::new(products, total, page);

        if let Some(key) = &cache_key {
            resources.cache.store(key, &body).await;
        }
        Ok((StatusCode::OK, Json(body)).into_response())
    }

    /// Handle GET /api/products/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let caller = optional_auth(&resources, &headers)?;
        if caller.is_some() {
            let product = Self::load_visible(&resources, &id, caller.as_ref()).await?;
            return Ok((StatusCode::OK, Json(product)).into_response());
        }

        let key = CacheKey::item(CacheNamespace::Products, id.trim());
        if let Some(cached) = resources.cache.fetch::<Product>(&key).await {
            return Ok((StatusCode::OK, Json(cached)).into_response());
        }
        let product = Self::load_visible(&resources, &id, None).await?;
        resources.cache.store(&key, &product).await;
        Ok((StatusCode::OK, Json(product)).into_response())
    }

    /// Handle POST /api/products
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<CreateProductBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;

        let title = required_text("title", body.title.as_deref(), MAX_TITLE_LEN)?;
        let description = required_text("body", body.body.as_deref(), MAX_BODY_LEN)?;
        let price_cents = non_negative(
            "price_cents",
            body.price_cents
                .ok_or_else(|| AppError::missing_field("price_cents"))?,
        )?;
        let stock = non_negative("stock", body.stock.unwrap_or(0))?;
        let status = body
            .status
            .as_deref()
            .map(|raw| parse_choice::<ProductStatus>("status", raw))
            .transpose()?
            .unwrap_or_default();
        let tags = normalize_tags(&body.tags)?;
        let currency = match body.currency.as_deref() {
            Some(code) => normalize_currency(code)?,
            None => Self::default_currency(&resources).await?,
        };

        let category_id =
            resolve_category(&resources, body.category.as_deref(), CategoryKind::Product).await?;
        let slug = unique_slug(
            &resources,
            SlugTable::Products,
            body.title.as_deref().unwrap_or_default(),
        )
        .await?;

        let now = Utc::now();
        let draft = Product {
            id: Uuid::new_v4(),
            seller_id: auth.user_id,
            category_id,
            title,
            slug,
            body: description,
            price_cents,
            currency,
            stock,
            status,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let product = resources.database.create_product(&draft, &tags).await?;

        invalidate(&resources, &[CacheNamespace::Products, CacheNamespace::Tags]).await;
        Ok((StatusCode::CREATED, Json(product)).into_response())
    }

    /// Handle PUT /api/products/:id
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        JsonBody(body): JsonBody<UpdateProductBody>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;

        let title = body
            .title
            .as_deref()
            .map(|raw| required_text("title", Some(raw), MAX_TITLE_LEN))
            .transpose()?;
        let description = body
            .body
            .as_deref()
            .map(|raw| required_text("body", Some(raw), MAX_BODY_LEN))
            .transpose()?;
        let price_cents = body
            .price_cents
            .map(|value| non_negative("price_cents", value))
            .transpose()?;
        let stock = body
            .stock
            .map(|value| non_negative("stock", value))
            .transpose()?;
        let currency = body.currency.as_deref().map(normalize_currency).transpose()?;
        let status = body
            .status
            .as_deref()
            .map(|raw| parse_choice::<ProductStatus>("status", raw))
            .transpose()?;
        let tags = body.tags.as_deref().map(normalize_tags).transpose()?;

        let mut product = Self::load_owned(&resources, &id, &auth).await?;
        if body.category.is_some() {
            product.category_id =
                resolve_category(&resources, body.category.as_deref(), CategoryKind::Product)
                    .await?;
        }

        if let Some(title) = title {
            product.title = title;
        }
        if let Some(description) = description {
            product.body = description;
        }
        if let Some(price_cents) = price_cents {
            product.price_cents = price_cents;
        }
        if let Some(currency) = currency {
            product.currency = currency;
        }
        if let Some(status) = status {
            product.status = status;
        }
        product.updated_at = Utc::now();

        let product = resources
            .database
            .update_product(&product, stock, tags.as_deref())
            .await?;

        invalidate(&resources, &[CacheNamespace::Products, CacheNamespace::Tags]).await;
        Ok((StatusCode::OK, Json(product)).into_response())
    }

    /// Handle DELETE /api/products/:id
    ///
    /// Past orders keep their line items; the product reference becomes null.
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let product = Self::load_owned(&resources, &id, &auth).await?;

        let images = resources
            .database
            .list_images(ImageParent::Product(product.id))
            .await?;
        if !resources.database.delete_product(product.id).await? {
            return Err(AppError::not_found("Product").with_resource_id(product.id.to_string()));
        }

        remove_files(
            &resources,
            images.iter().flat_map(|image| image.stored_paths()).collect(),
        )
        .await;
        invalidate(&resources, &[CacheNamespace::Products]).await;
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
