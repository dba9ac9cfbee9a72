// ABOUTME: HTTP server assembly for the Emporium API
// ABOUTME: Merges the resource routers, applies the tower middleware stack and runs with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! HTTP server
//!
//! [`EmporiumServer::router`] builds the complete application, which is what
//! integration tests drive through `tower::ServiceExt::oneshot`.
//! [`EmporiumServer::run`] binds the listener, optionally runs the job
//! workers in-process and drains both on shutdown.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::errors::{AppError, ErrorCode, ErrorResponse};
use crate::jobs::{JobWorkerPool, RetryPolicy};
use crate::middleware::{
    create_request_span, record_response, setup_cors, MakeRequestUuid, REQUEST_ID_HEADER,
};
use crate::resources::ServerResources;
use crate::routes::{
    AuthRoutes, CategoryRoutes, HealthRoutes, ImageRoutes, OrderRoutes, PostRoutes,
    ProductRoutes, SettingsRoutes, TagRoutes,
};

/// Room for multipart framing around the largest accepted upload
const BODY_LIMIT_MARGIN_BYTES: usize = 64 * 1024;

/// The Emporium HTTP server
pub struct EmporiumServer {
    resources: Arc<ServerResources>,
}

impl EmporiumServer {
    /// Create a server over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Shared resources
    #[must_use]
    pub fn resources(&self) -> &Arc<ServerResources> {
        &self.resources
    }

    /// Build the full application router with its middleware stack
    #[must_use]
    pub fn router(&self) -> Router {
        let resources = &self.resources;
        let config = &resources.config;

        let api = Router::new()
            .merge(HealthRoutes::routes(Arc::clone(resources)))
            .merge(AuthRoutes::routes(Arc::clone(resources)))
            .merge(PostRoutes::routes(Arc::clone(resources)))
            .merge(ProductRoutes::routes(Arc::clone(resources)))
            .merge(CategoryRoutes::routes(Arc::clone(resources)))
            .merge(TagRoutes::routes(Arc::clone(resources)))
            .merge(ImageRoutes::routes(Arc::clone(resources)))
            .merge(OrderRoutes::routes(Arc::clone(resources)))
            .merge(SettingsRoutes::routes(Arc::clone(resources)))
            .fallback(handle_not_found);

        // Layers run outside-in: the last one added sees the request first
        api.layer(
            TraceLayer::new_for_http()
                .make_span_with(create_request_span)
                .on_response(record_response),
        )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(setup_cors(&config.http))
            .layer(RequestBodyLimitLayer::new(
                config
                    .media
                    .max_upload_bytes
                    .saturating_add(BODY_LIMIT_MARGIN_BYTES),
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.http.request_timeout_secs,
            )))
            .layer(CatchPanicLayer::custom(panic_response))
    }

    /// Serve on `port` until ctrl-c or SIGTERM
    ///
    /// With `embedded_workers` the job worker pool runs in this process and
    /// is drained after the listener stops accepting requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails
    pub async fn run(self, port: u16, embedded_workers: bool) -> Result<()> {
        let config = Arc::clone(&self.resources.config);

        let workers = embedded_workers.then(|| {
            JobWorkerPool::start(
                self.resources.jobs.as_ref().clone(),
                self.resources.job_runner(),
                RetryPolicy::from_config(&config.jobs),
                config.jobs.workers,
                Duration::from_millis(config.jobs.poll_interval_ms),
            )
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!("HTTP server listening on http://{}", addr);

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(pool) = workers {
            pool.shutdown().await;
        }

        served.context("HTTP server failed")?;
        info!("Server stopped");
        Ok(())
    }
}

/// JSON 404 for unknown routes
async fn handle_not_found(method: Method, uri: Uri) -> Response {
    AppError::new(
        ErrorCode::ResourceNotFound,
        format!("No route for {method} {}", uri.path()),
    )
    .into_response()
}

/// JSON 500 for handler panics
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Request handler panicked");

    let body: ErrorResponse = AppError::internal("Internal server error").into();
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Resolve on ctrl-c, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received ctrl-c, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
