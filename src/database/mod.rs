// ABOUTME: Database manager for the relational content and commerce schema
// ABOUTME: Owns the SQLite pool, runs inline migrations and provides row decoding helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Database Management
//!
//! A single [`Database`] handle wraps the `sqlx` SQLite pool. Each table
//! group lives in its own module as an `impl Database` block with a
//! `migrate_*` method and the queries for that group. Referential integrity
//! (cascades, `SET NULL`, uniqueness) is enforced by SQLite itself.

mod categories;
mod images;
mod orders;
mod otps;
mod posts;
mod products;
mod settings;
mod tags;
mod users;

pub use orders::OrderLine;
pub use posts::PostFilter;
pub use products::ProductFilter;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseUrl;
use crate::errors::{AppError, AppResult};

/// Which rows of a publishable table a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Anonymous callers: published posts / active products only
    PublicOnly,
    /// Signed-in users: public rows plus their own drafts
    PublicOrOwnedBy(Uuid),
    /// Administrators: everything
    All,
}

/// Database manager for all application tables
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a migration fails
    pub async fn new(url: &DatabaseUrl) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&url.to_connection_string())
            .map_err(|e| AppError::config(format!("Invalid database URL {url}: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if url.is_memory() {
            // Every pooled connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            if let DatabaseUrl::SQLite { path } = url {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            SqlitePoolOptions::new()
                .max_connections(8)
                .acquire_timeout(Duration::from_secs(10))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {url}: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(database = %url, "Database ready");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any `CREATE` statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        // Order matters: referenced tables first
        self.migrate_users().await?;
        self.migrate_otps().await?;
        self.migrate_categories().await?;
        self.migrate_tags().await?;
        self.migrate_posts().await?;
        self.migrate_products().await?;
        self.migrate_orders().await?;
        self.migrate_images().await?;
        self.migrate_settings().await?;
        Ok(())
    }

    /// Cheap connectivity probe for readiness checks
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not answer
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn execute_ddl(&self, statements: &[&str]) -> AppResult<()> {
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        }
        Ok(())
    }
}

pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> AppResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| AppError::database(format!("Invalid UUID in column '{column}': {e}")))
}

pub(crate) fn get_opt_uuid(row: &SqliteRow, column: &str) -> AppResult<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        Uuid::parse_str(&value)
            .map_err(|e| AppError::database(format!("Invalid UUID in column '{column}': {e}")))
    })
    .transpose()
}

pub(crate) fn get_datetime(row: &SqliteRow, column: &str) -> AppResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(&raw, column)
}

pub(crate) fn get_opt_datetime(row: &SqliteRow, column: &str) -> AppResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| parse_timestamp(&value, column)).transpose()
}

fn parse_timestamp(raw: &str, column: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp in column '{column}': {e}")))
}

pub(crate) fn get_enum<T>(row: &SqliteRow, column: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: AppError| AppError::database(format!("Column '{column}': {}", e.message)))
}

pub(crate) fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
