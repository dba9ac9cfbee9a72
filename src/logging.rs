// ABOUTME: Tracing subscriber setup and structured domain event helpers
// ABOUTME: Picks JSON output in production, pretty output elsewhere, and quiets chatty dependencies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Structured logging
//!
//! [`LoggingConfig::from_env`] reads `RUST_LOG`, `LOG_FORMAT`, `ENVIRONMENT`
//! and a few `LOG_INCLUDE_*` switches. Both binaries call [`init_from_env`]
//! before anything else so configuration loading is already traced.

use std::env;
use std::io;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::constants::service_names;

/// Dependencies that log far too much at `info`
const NOISE_FILTERS: [&str; 6] = [
    "hyper=warn",
    "hyper::proto=warn",
    "sqlx=warn",
    "sqlx::query=warn",
    "tower_http=info",
    "redis=warn",
];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-field human readable output
    Pretty,
    /// Single-line output without targets
    Compact,
}

impl LogFormat {
    fn parse(raw: Option<&str>, is_production: bool) -> Self {
        match raw {
            Some("json") => Self::Json,
            Some("compact") => Self::Compact,
            Some("pretty") => Self::Pretty,
            _ if is_production => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level for this crate (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Include thread ids and names
    pub include_thread: bool,
    /// Emit span open/close events (request and job timings)
    pub include_spans: bool,
    /// Service name attached to the startup event
    pub service_name: String,
    /// Deployment environment name
    pub environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
            include_thread: false,
            include_spans: false,
            service_name: service_names::EMPORIUM_SERVER.into(),
            environment: "development".into(),
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let is_production = matches!(environment.as_str(), "production" | "prod");

        Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: LogFormat::parse(env::var("LOG_FORMAT").ok().as_deref(), is_production),
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_thread: env::var("LOG_INCLUDE_THREAD").is_ok(),
            include_spans: env::var("LOG_INCLUDE_SPANS").is_ok(),
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| service_names::EMPORIUM_SERVER.into()),
            environment,
        }
    }

    /// `RUST_LOG` wins when set; otherwise our level plus the noise filters
    fn env_filter(&self) -> EnvFilter {
        if let Ok(directives) = env::var("RUST_LOG") {
            return EnvFilter::new(directives);
        }
        NOISE_FILTERS
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(
                EnvFilter::new(format!("warn,emporium_server={}", self.level)),
                EnvFilter::add_directive,
            )
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.env_filter());
        let layer = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_thread_ids(self.include_thread)
            .with_thread_names(self.include_thread)
            .with_writer(io::stdout)
            .with_span_events(self.span_events());

        match self.format {
            LogFormat::Json => registry.with(layer.json()).try_init()?,
            LogFormat::Pretty => registry.with(layer.with_target(true)).try_init()?,
            LogFormat::Compact => registry.with(layer.compact().with_target(false)).try_init()?,
        }

        info!(
            service.name = %self.service_name,
            service.version = env!("CARGO_PKG_VERSION"),
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "Logging initialized"
        );
        Ok(())
    }
}

/// Initialize logging from environment
///
/// # Errors
///
/// Returns an error if logging initialization fails
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Structured events with stable field names for log queries
pub struct AppLogger;

impl AppLogger {
    /// Sign-in, registration and one-time-code events
    pub fn log_auth_event(user_id: &str, event: &str, success: bool, details: Option<&str>) {
        info!(
            user.id = %user_id,
            auth.event = %event,
            auth.success = success,
            auth.details = details.unwrap_or(""),
            "Authentication event"
        );
    }

    /// Order placed or moved to another status
    pub fn log_order_event(order_id: &str, user_id: &str, status: &str, total_cents: i64) {
        info!(
            order.id = %order_id,
            user.id = %user_id,
            order.status = %status,
            order.total_cents = total_cents,
            "Order event"
        );
    }

    /// Background job outcome
    pub fn log_job_event(job_id: &str, kind: &str, attempt: u32, outcome: &str) {
        info!(
            job.id = %job_id,
            job.kind = %kind,
            job.attempt = attempt,
            job.outcome = %outcome,
            "Job event"
        );
    }

    /// Accepted upload
    pub fn log_upload(user_id: &str, image_id: &str, mime_type: &str, size_bytes: usize) {
        info!(
            user.id = %user_id,
            image.id = %image_id,
            image.mime = %mime_type,
            image.size_bytes = size_bytes,
            "Image uploaded"
        );
    }

    /// Suspicious activity such as one-time-code guessing
    pub fn log_security_event(
        event_type: &str,
        severity: &str,
        details: &str,
        user_id: Option<&str>,
    ) {
        warn!(
            security.event = %event_type,
            security.severity = %severity,
            security.details = %details,
            user.id = user_id.unwrap_or("unknown"),
            "Security event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.service_name, "emporium-server");
        assert_eq!(config.span_events(), FmtSpan::NONE);
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(LogFormat::parse(None, true), LogFormat::Json);
        assert_eq!(LogFormat::parse(None, false), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(Some("compact"), true), LogFormat::Compact);
        assert_eq!(LogFormat::parse(Some("bogus"), false), LogFormat::Pretty);
    }
}
