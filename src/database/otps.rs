// ABOUTME: One-time password storage
// ABOUTME: Issues hashed codes, tracks failed attempts and consumes codes exactly once

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{get_datetime, get_enum, get_opt_datetime, get_uuid, Database};
use crate::errors::AppResult;
use crate::models::{Otp, OtpPurpose};

impl Database {
    pub(super) async fn migrate_otps(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS otps (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                purpose TEXT NOT NULL CHECK (purpose IN ('email_verification', 'password_reset', 'login')),
                code_hash TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                expires_at TEXT NOT NULL,
                consumed_at TEXT,
                created_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_otps_user_purpose ON otps(user_id, purpose)",
        ])
        .await
    }

    /// Store a new code, retiring any earlier unconsumed code for the same purpose
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails
    pub async fn create_otp(&self, otp: &Otp) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r"
            UPDATE otps SET consumed_at = $1
            WHERE user_id = $2 AND purpose = $3 AND consumed_at IS NULL
            ",
        )
        .bind(&now)
        .bind(otp.user_id.to_string())
        .bind(otp.purpose.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO otps (id, user_id, purpose, code_hash, attempts, expires_at, consumed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, $7)
            ",
        )
        .bind(otp.id.to_string())
        .bind(otp.user_id.to_string())
        .bind(otp.purpose.as_str())
        .bind(&otp.code_hash)
        .bind(otp.attempts)
        .bind(otp.expires_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(otp.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Most recent unconsumed code for a user and purpose (possibly expired)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_active_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> AppResult<Option<Otp>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, purpose, code_hash, attempts, expires_at, consumed_at, created_at
            FROM otps
            WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.to_string())
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_otp).transpose()
    }

    /// Spend one verification attempt on a live code
    ///
    /// The check and the increment are a single statement, so concurrent
    /// guesses cannot all slip under `max_attempts`. Returns the attempt
    /// number claimed, or `None` when the code is consumed, expired or out
    /// of attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn claim_otp_attempt(
        &self,
        otp_id: Uuid,
        max_attempts: i64,
    ) -> AppResult<Option<i64>> {
        let attempts: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE otps SET attempts = attempts + 1
            WHERE id = $1 AND consumed_at IS NULL AND attempts < $2 AND expires_at > $3
            RETURNING attempts
            ",
        )
        .bind(otp_id.to_string())
        .bind(max_attempts)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempts)
    }

    /// Consume a code; returns false if it was already consumed concurrently
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn consume_otp(&self, otp_id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE otps SET consumed_at = $1 WHERE id = $2 AND consumed_at IS NULL")
                .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
                .bind(otp_id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn row_to_otp(row: &SqliteRow) -> AppResult<Otp> {
    Ok(Otp {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        purpose: get_enum(row, "purpose")?,
        code_hash: row.try_get("code_hash")?,
        attempts: row.try_get("attempts")?,
        expires_at: get_datetime(row, "expires_at")?,
        consumed_at: get_opt_datetime(row, "consumed_at")?,
        created_at: get_datetime(row, "created_at")?,
    })
}
