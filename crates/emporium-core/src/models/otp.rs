// ABOUTME: One-time password record
// ABOUTME: Hashed numeric codes bound to a user and a purpose with expiry and attempt count
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// What an OTP may be exchanged for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    /// Confirms ownership of the account e-mail
    EmailVerification,
    /// Allows setting a new password
    PasswordReset,
    /// Password-less sign in
    Login,
}

impl OtpPurpose {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
            Self::Login => "login",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verification" => Ok(Self::EmailVerification),
            "password_reset" => Ok(Self::PasswordReset),
            "login" => Ok(Self::Login),
            other => Err(AppError::invalid_input(format!("Invalid OTP purpose: {other}"))),
        }
    }
}

/// Stored one-time password
#[derive(Debug, Clone)]
pub struct Otp {
    /// Unique identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// What the code unlocks
    pub purpose: OtpPurpose,
    /// sha256 hex digest of the code
    pub code_hash: String,
    /// Verification attempts spent so far
    pub attempts: i64,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Set once the code was exchanged
    pub consumed_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
