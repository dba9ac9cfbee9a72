// ABOUTME: Server binary for the Emporium content and commerce API
// ABOUTME: Loads configuration, connects backends and serves HTTP with embedded job workers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Emporium API Server Binary
//!
//! Starts the HTTP API. Job workers run in the same process unless
//! `--no-workers` is given, which is meant for deployments where
//! `emporium-worker` consumes a shared Redis queue.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use emporium_server::{
    config::{DatabaseUrl, ServerConfig},
    logging,
    resources::ServerResources,
    server::EmporiumServer,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "emporium-server")]
#[command(about = "Emporium - content and commerce REST API")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL (sqlite:<path> or sqlite::memory:)
    #[arg(long)]
    database_url: Option<String>,

    /// Do not run job workers in this process
    #[arg(long)]
    no_workers: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(url) = args.database_url.as_deref() {
        config.database.url = DatabaseUrl::parse_url(url)?;
    }
    config.validate()?;

    info!("Starting Emporium API");
    info!("{}", config.summary());

    if args.no_workers && config.jobs.redis_url.is_none() {
        warn!("--no-workers with the in-memory job queue: queued jobs will never run");
    }

    let port = config.http_port;
    let resources = Arc::new(ServerResources::initialize(config).await?);
    info!(
        cache = resources.cache.backend_name(),
        jobs = resources.jobs.backend_name(),
        "Backends initialized"
    );

    display_available_endpoints(port);

    let server = EmporiumServer::new(resources);
    if let Err(e) = server.run(port, !args.no_workers).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Log the route table once at startup
#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(port: u16) {
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let base = format!("http://{host}:{port}");

    info!("=== Available API Endpoints ===");
    info!("Health:     GET  {base}/health, {base}/ready");
    info!("Auth:       POST {base}/api/auth/register, /login, /otp, /otp/verify");
    info!("            GET  {base}/api/auth/me");
    info!("Posts:      GET|POST {base}/api/posts, GET|PUT|DELETE {base}/api/posts/:id");
    info!("Products:   GET|POST {base}/api/products, GET|PUT|DELETE {base}/api/products/:id");
    info!("Categories: GET|POST {base}/api/categories, GET|PUT|DELETE {base}/api/categories/:id");
    info!("Tags:       GET {base}/api/tags, DELETE {base}/api/tags/:id");
    info!("Images:     POST {base}/api/images, GET|DELETE {base}/api/images/:id");
    info!("Orders:     GET|POST {base}/api/orders, GET {base}/api/orders/:id");
    info!("            POST {base}/api/orders/:id/cancel, PUT {base}/api/orders/:id/status");
    info!("Settings:   GET {base}/api/settings, GET|PUT|DELETE {base}/api/settings/:key");
    info!("=== End of Endpoint List ===");
}
