// ABOUTME: Route module organization for the Emporium HTTP API
// ABOUTME: Declares one router per resource family plus helpers shared by the handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Route module for the Emporium server
//!
//! Each domain module exposes a `*Routes` type with a `routes` constructor.
//! Mutating handlers follow one sequence: validate and sanitize the input,
//! check that referenced rows exist and belong to the caller, perform a
//! single write, enqueue the follow-up background jobs and answer with JSON.

/// Registration, login, session and OTP routes
pub mod auth;
/// Category routes
pub mod categories;
/// Health and readiness routes
pub mod health;
/// Image upload and lookup routes
pub mod images;
/// Order placement and lifecycle routes
pub mod orders;
/// Post routes
pub mod posts;
/// Product routes
pub mod products;
/// Site settings routes
pub mod settings;
/// Tag routes
pub mod tags;

pub use auth::AuthRoutes;
pub use categories::CategoryRoutes;
pub use health::HealthRoutes;
pub use images::ImageRoutes;
pub use orders::OrderRoutes;
pub use posts::PostRoutes;
pub use products::ProductRoutes;
pub use settings::SettingsRoutes;
pub use tags::TagRoutes;

use http::HeaderMap;
use uuid::Uuid;

use crate::auth::AuthResult;
use crate::cache::CacheNamespace;
use crate::database::Visibility;
use crate::errors::{AppError, AppResult};
use crate::jobs::Job;
use crate::models::CategoryKind;
use crate::resources::ServerResources;

/// Attempts at finding a free slug before giving up
const SLUG_ATTEMPTS: usize = 5;

/// Require a valid session
pub(crate) fn require_auth(
    resources: &ServerResources,
    headers: &HeaderMap,
) -> AppResult<AuthResult> {
    resources
        .auth_middleware
        .authenticate_request_with_headers(headers)
}

/// Session if present; malformed credentials are still rejected
pub(crate) fn optional_auth(
    resources: &ServerResources,
    headers: &HeaderMap,
) -> AppResult<Option<AuthResult>> {
    resources.auth_middleware.optional_authentication(headers)
}

/// Rows of publishable tables the caller may read
pub(crate) fn visibility_for(caller: Option<&AuthResult>) -> Visibility {
    match caller {
        None => Visibility::PublicOnly,
        Some(auth) if auth.role.is_admin() => Visibility::All,
        Some(auth) => Visibility::PublicOrOwnedBy(auth.user_id),
    }
}

/// Enqueue one invalidation job per namespace
pub(crate) async fn invalidate(resources: &ServerResources, namespaces: &[CacheNamespace]) {
    for namespace in namespaces {
        resources.jobs.dispatch(Job::invalidate(*namespace)).await;
    }
}

/// Enqueue deletion of stored files, if there are any
pub(crate) async fn remove_files(resources: &ServerResources, paths: Vec<String>) {
    if !paths.is_empty() {
        resources.jobs.dispatch(Job::RemoveFiles { paths }).await;
    }
}

/// Resolve an optional category reference (id or slug) of `kind`
///
/// A blank reference means "no category". An unknown one is a 404.
pub(crate) async fn resolve_category(
    resources: &ServerResources,
    reference: Option<&str>,
    kind: CategoryKind,
) -> AppResult<Option<Uuid>> {
    let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    resources
        .database
        .find_category(reference, kind)
        .await?
        .map(|category| Some(category.id))
        .ok_or_else(|| {
            AppError::not_found("Category")
                .with_resource_id(reference)
                .with_details(serde_json::json!({ "field": "category" }))
        })
}

/// Which table a slug must be unique in
#[derive(Debug, Clone, Copy)]
pub(crate) enum SlugTable {
    Posts,
    Products,
}

/// Derive a slug from `title` that is not yet taken
///
/// The bare slug is tried first, then variants with a random suffix.
pub(crate) async fn unique_slug(
    resources: &ServerResources,
    table: SlugTable,
    title: &str,
) -> AppResult<String> {
    let base = crate::utils::validation::base_slug(title);
    let mut candidate = base.clone();
    for _ in 0..SLUG_ATTEMPTS {
        let taken = match table {
            SlugTable::Posts => resources.database.post_slug_exists(&candidate).await?,
            SlugTable::Products => resources.database.product_slug_exists(&candidate).await?,
        };
        if !taken {
            return Ok(candidate);
        }
        candidate = crate::utils::validation::slug_with_suffix(&base);
    }
    Err(AppError::already_exists(format!(
        "Could not derive a free slug from '{base}'"
    )))
}
