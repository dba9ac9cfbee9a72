// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Liveness answers unconditionally, readiness probes the database, cache and job queue
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Health check routes for service monitoring
//!
//! `/health` is a liveness probe and never touches a dependency.
//! `/ready` checks every backend and answers 503 when one of them fails.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::resources::ServerResources;

/// State of one dependency in a readiness report
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    /// Backend in use
    pub backend: &'static str,
    /// Whether the probe succeeded
    pub healthy: bool,
    /// Probe failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    fn from_probe<T, E: std::fmt::Display>(backend: &'static str, probe: Result<T, E>) -> Self {
        match probe {
            Ok(_) => Self {
                backend,
                healthy: true,
                error: None,
            },
            Err(e) => Self {
                backend,
                healthy: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Readiness report
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// `ready` or `degraded`
    pub status: &'static str,
    /// Report time
    pub timestamp: String,
    /// Database probe
    pub database: ComponentStatus,
    /// Cache probe
    pub cache: ComponentStatus,
    /// Job queue probe
    pub jobs: ComponentStatus,
}

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/ready", get(Self::handle_ready))
            .with_state(resources)
    }

    async fn handle_health() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    async fn handle_ready(State(resources): State<Arc<ServerResources>>) -> Response {
        let (database, cache, jobs) = tokio::join!(
            resources.database.health_check(),
            resources.cache.health_check(),
            resources.jobs.health_check(),
        );

        let report = ReadinessResponse {
            status: "ready",
            timestamp: chrono::Utc::now().to_rfc3339(),
            database: ComponentStatus::from_probe("sqlite", database),
            cache: ComponentStatus::from_probe(resources.cache.backend_name(), cache),
            jobs: ComponentStatus::from_probe(resources.jobs.backend_name(), jobs),
        };

        if report.database.healthy && report.cache.healthy && report.jobs.healthy {
            (StatusCode::OK, Json(report)).into_response()
        } else {
            tracing::warn!(
                database = report.database.healthy,
                cache = report.cache.healthy,
                jobs = report.jobs.healthy,
                "Readiness probe failed"
            );
            let report = ReadinessResponse {
                status: "degraded",
                ..report
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(report)).into_response()
        }
    }
}
