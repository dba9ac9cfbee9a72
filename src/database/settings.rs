// ABOUTME: Site settings storage
// ABOUTME: JSON values keyed by short identifiers, written by administrators

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{get_datetime, get_opt_uuid, Database};
use crate::errors::AppResult;
use crate::models::Setting;

impl Database {
    pub(super) async fn migrate_settings(&self) -> AppResult<()> {
        self.execute_ddl(&[r"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                updated_by TEXT REFERENCES users(id) ON DELETE SET NULL
            )
            "])
        .await
    }

    /// All settings ordered by key
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored value is not JSON
    pub async fn list_settings(&self) -> AppResult<Vec<Setting>> {
        let rows = sqlx::query("SELECT key, value, updated_at, updated_by FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_setting).collect()
    }

    /// Get one setting
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored value is not JSON
    pub async fn get_setting(&self, key: &str) -> AppResult<Option<Setting>> {
        let row = sqlx::query("SELECT key, value, updated_at, updated_by FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_setting).transpose()
    }

    /// Insert or replace a setting
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or the write fails
    pub async fn upsert_setting(
        &self,
        key: &str,
        value: &serde_json::Value,
        updated_by: Uuid,
    ) -> AppResult<Setting> {
        let now = Utc::now();
        sqlx::query(
            r"
            INSERT INTO settings (key, value, updated_at, updated_by) VALUES ($1, $2, $3, $4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by
            ",
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(now.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(updated_by.to_string())
        .execute(&self.pool)
        .await?;

        Ok(Setting {
            key: key.to_owned(),
            value: value.clone(),
            updated_at: now,
            updated_by: Some(updated_by),
        })
    }

    /// Delete a setting
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_setting(&self, key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_setting(row: &SqliteRow) -> AppResult<Setting> {
    let raw: String = row.try_get("value")?;
    Ok(Setting {
        key: row.try_get("key")?,
        value: serde_json::from_str(&raw)?,
        updated_at: get_datetime(row, "updated_at")?,
        updated_by: get_opt_uuid(row, "updated_by")?,
    })
}
