// ABOUTME: Server configuration loaded from environment variables
// ABOUTME: Covers database, auth, cache, job queue, media and HTTP settings plus validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Server configuration read from the process environment

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{cache, jobs, limits};

/// Port the HTTP API listens on unless `HTTP_PORT` says otherwise
pub const DEFAULT_HTTP_PORT: u16 = 8081;
/// Default SQLite location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/emporium.db";
/// Default upload directory
pub const DEFAULT_UPLOAD_DIR: &str = "./data/uploads";
/// Default session lifetime
pub const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24;
/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a testing environment
    #[must_use]
    pub const fn is_testing(&self) -> bool {
        matches!(self, Self::Testing)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite {
        /// Database file
        path: PathBuf,
    },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error for URL schemes other than `sqlite:`
    pub fn parse_url(s: &str) -> Result<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            let path_str = path_str.trim_start_matches("//");
            if path_str == ":memory:" || path_str.is_empty() {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path_str),
                })
            }
        } else if s.contains("://") {
            Err(anyhow::anyhow!(
                "Unsupported database URL scheme (only sqlite: is supported): {s}"
            ))
        } else {
            // Bare paths are SQLite files
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/emporium.db"),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Deployment mode
    pub environment: Environment,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Session and OTP configuration
    pub auth: AuthConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Background job configuration
    pub jobs: JobConfig,
    /// Upload storage configuration
    pub media: MediaConfig,
    /// HTTP layer configuration
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: DatabaseUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// JWT expiry time in hours
    pub jwt_expiry_hours: i64,
    /// Lifetime of one-time passwords in seconds
    pub otp_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: generate_secret(),
            jwt_expiry_hours: DEFAULT_JWT_EXPIRY_HOURS,
            otp_ttl_secs: limits::DEFAULT_OTP_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL for distributed caching (optional)
    pub redis_url: Option<String>,
    /// Maximum number of entries in local cache
    pub max_entries: usize,
    /// Cache cleanup interval in seconds
    pub cleanup_interval_secs: u64,
    /// TTL for list responses
    pub ttl_list_secs: u64,
    /// TTL for single-item responses
    pub ttl_item_secs: u64,
    /// Whether to spawn the background cleanup task (disabled in tests)
    pub enable_background_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            max_entries: cache::DEFAULT_CACHE_MAX_ENTRIES,
            cleanup_interval_secs: cache::DEFAULT_CLEANUP_INTERVAL_SECS,
            ttl_list_secs: cache::TTL_LIST_SECS,
            ttl_item_secs: cache::TTL_ITEM_SECS,
            enable_background_cleanup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Redis URL for the shared job queue (optional)
    pub redis_url: Option<String>,
    /// Number of worker tasks
    pub workers: usize,
    /// Attempts per job before giving up
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub backoff_ms: u64,
    /// Idle poll interval for the Redis backend
    pub poll_interval_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            workers: jobs::DEFAULT_WORKER_COUNT,
            max_attempts: jobs::DEFAULT_MAX_ATTEMPTS,
            backoff_ms: jobs::DEFAULT_BACKOFF_MS,
            poll_interval_ms: jobs::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory uploads are written to
    pub upload_dir: PathBuf,
    /// Largest accepted upload
    pub max_upload_bytes: usize,
    /// Optimized images are downscaled to this width
    pub image_max_width: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: limits::DEFAULT_MAX_UPLOAD_BYTES,
            image_max_width: limits::DEFAULT_IMAGE_MAX_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// CORS allowed origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec!["*".to_owned()],
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            environment: Environment::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            jobs: JobConfig::default(),
            media: MediaConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let jwt_secret = if let Ok(secret) = env::var("JWT_SECRET") {
            secret
        } else {
            warn!("JWT_SECRET not set; generated a per-process secret, sessions will not survive restarts");
            generate_secret()
        };
        // One Redis instance backs both the cache and the job queue
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let config = Self {
            http_port: env_parse("HTTP_PORT", DEFAULT_HTTP_PORT)?,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )?),
            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL)?)?,
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_expiry_hours: env_parse("JWT_EXPIRY_HOURS", DEFAULT_JWT_EXPIRY_HOURS)?,
                otp_ttl_secs: env_parse("OTP_TTL_SECS", limits::DEFAULT_OTP_TTL_SECS)?,
            },
            cache: CacheConfig {
                redis_url: redis_url.clone(),
                max_entries: env_parse("CACHE_MAX_ENTRIES", cache::DEFAULT_CACHE_MAX_ENTRIES)?,
                cleanup_interval_secs: env_parse(
                    "CACHE_CLEANUP_INTERVAL_SECS",
                    cache::DEFAULT_CLEANUP_INTERVAL_SECS,
                )?,
                ttl_list_secs: env_parse("CACHE_TTL_LIST_SECS", cache::TTL_LIST_SECS)?,
                ttl_item_secs: env_parse("CACHE_TTL_ITEM_SECS", cache::TTL_ITEM_SECS)?,
                enable_background_cleanup: true,
            },
            jobs: JobConfig {
                redis_url,
                workers: env_parse("JOB_WORKERS", jobs::DEFAULT_WORKER_COUNT)?,
                max_attempts: env_parse("JOB_MAX_ATTEMPTS", jobs::DEFAULT_MAX_ATTEMPTS)?,
                backoff_ms: env_parse("JOB_BACKOFF_MS", jobs::DEFAULT_BACKOFF_MS)?,
                poll_interval_ms: env_parse("JOB_POLL_INTERVAL_MS", jobs::DEFAULT_POLL_INTERVAL_MS)?,
            },
            media: MediaConfig {
                upload_dir: PathBuf::from(env_var_or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)?),
                max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", limits::DEFAULT_MAX_UPLOAD_BYTES)?,
                image_max_width: env_parse("IMAGE_MAX_WIDTH", limits::DEFAULT_IMAGE_MAX_WIDTH)?,
            },
            http: HttpConfig {
                cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")?),
                request_timeout_secs: env_parse(
                    "REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?,
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when a value is outside its usable range
    pub fn validate(&self) -> Result<()> {
        if self.jobs.workers == 0 {
            return Err(anyhow::anyhow!("JOB_WORKERS must be at least 1"));
        }
        if self.jobs.max_attempts == 0 {
            return Err(anyhow::anyhow!("JOB_MAX_ATTEMPTS must be at least 1"));
        }
        if self.auth.jwt_expiry_hours <= 0 {
            return Err(anyhow::anyhow!("JWT_EXPIRY_HOURS must be positive"));
        }
        if self.auth.otp_ttl_secs <= 0 {
            return Err(anyhow::anyhow!("OTP_TTL_SECS must be positive"));
        }
        if self.media.image_max_width == 0 {
            return Err(anyhow::anyhow!("IMAGE_MAX_WIDTH must be positive"));
        }
        if self.environment.is_production() && self.auth.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters in production"
            ));
        }
        if self.environment.is_production() && self.http.cors_origins.iter().any(|o| o == "*") {
            warn!("CORS_ORIGINS allows any origin in production");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Emporium Server Configuration:\n\
             - Environment: {}\n\
             - HTTP Port: {}\n\
             - Database: {}\n\
             - Cache: {} (max {} entries)\n\
             - Job Queue: {} ({} workers, {} attempts, {}ms backoff)\n\
             - Upload Dir: {} (max {} bytes)\n\
             - CORS Origins: {}",
            self.environment,
            self.http_port,
            self.database.url,
            if self.cache.redis_url.is_some() { "redis" } else { "in-memory" },
            self.cache.max_entries,
            if self.jobs.redis_url.is_some() { "redis" } else { "in-memory" },
            self.jobs.workers,
            self.jobs.max_attempts,
            self.jobs.backoff_ms,
            self.media.upload_dir.display(),
            self.media.max_upload_bytes,
            self.http.cors_origins.join(", "),
        )
    }
}

/// Read an environment variable, falling back to `default` when unset
///
/// # Errors
///
/// Returns an error when the variable is set but not valid unicode
pub fn env_var_or(key: &str, default: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value),
        Err(env::VarError::NotPresent) => Ok(default.to_owned()),
        Err(e) => Err(anyhow::anyhow!("Invalid value for {key}: {e}")),
    }
}

/// Parse a typed variable, using `default` when it is unset
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value '{raw}'")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(anyhow::anyhow!("Invalid value for {key}: {e}")),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_parsing() {
        assert_eq!(
            DatabaseUrl::parse_url("sqlite::memory:").unwrap(),
            DatabaseUrl::Memory
        );
        assert_eq!(
            DatabaseUrl::parse_url("sqlite:./data/x.db").unwrap(),
            DatabaseUrl::SQLite {
                path: PathBuf::from("./data/x.db")
            }
        );
        assert_eq!(
            DatabaseUrl::parse_url("/var/lib/emporium.db")
                .unwrap()
                .to_connection_string(),
            "sqlite:/var/lib/emporium.db"
        );
        assert!(DatabaseUrl::parse_url("postgres://localhost/db").is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("prod"),
            Environment::Production
        );
        assert_eq!(Environment::from_str_or_default("TEST"), Environment::Testing);
        assert_eq!(
            Environment::from_str_or_default("anything"),
            Environment::Development
        );
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,,"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.jobs.max_attempts, 3);
        assert_eq!(config.jobs.backoff_ms, 1000);
        assert!(!config.summary().contains(&config.auth.jwt_secret));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = ServerConfig::default();
        config.jobs.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_production_requires_long_secret() {
        let mut config = ServerConfig::default();
        config.environment = Environment::Production;
        config.auth.jwt_secret = "short".to_owned();
        assert!(config.validate().is_err());
    }
}
