// ABOUTME: User management database operations
// ABOUTME: Handles registration with first-user promotion, lookup and credential updates

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{count_to_u64, get_datetime, get_enum, get_uuid, Database};
use crate::errors::{AppError, AppResult};
use crate::models::User;

const USER_COLUMNS: &str =
    "id, email, display_name, password_hash, role, is_verified, created_at, updated_at";

impl Database {
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                is_verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        ])
        .await
    }

    /// Insert a new user; the very first account becomes an administrator
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` when the e-mail is taken
    pub async fn create_user(&self, user: &User) -> AppResult<User> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, password_hash, role, is_verified, created_at, updated_at)
            VALUES (
                $1, $2, $3, $4,
                CASE WHEN (SELECT COUNT(*) FROM users) = 0 THEN 'admin' ELSE $5 END,
                $6, $7, $7
            )
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(user.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.code == crate::errors::ErrorCode::ResourceAlreadyExists => {
                AppError::already_exists("An account with this email already exists")
            }
            err => err,
        })?;

        self.get_user(user.id)
            .await?
            .ok_or_else(|| AppError::internal("User vanished after insert"))
    }

    /// Get a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Get a user by (case-insensitive) e-mail
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Replace the password hash
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the user does not exist
    pub async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Mark the e-mail address as verified
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the user does not exist
    pub async fn mark_user_verified(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET is_verified = 1, updated_at = $1 WHERE id = $2")
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Number of registered users
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_user_count(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count_to_u64(count))
    }

    /// Delete an account and, through cascades, everything it owns
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: get_uuid(row, "id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        password_hash: row.try_get("password_hash")?,
        role: get_enum(row, "role")?,
        is_verified: row.try_get("is_verified")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}
