// ABOUTME: User account model
// ABOUTME: Full record with password hash and the public projection returned by the API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::UserRole;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Login e-mail, stored lower-cased
    pub email: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// bcrypt hash
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account role
    pub role: UserRole,
    /// Whether the e-mail address was confirmed via OTP
    pub is_verified: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new unverified user
    #[must_use]
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            display_name,
            password_hash,
            role: UserRole::User,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Projection safe to return to clients
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }
}

/// User fields exposed over HTTP
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    /// Unique identifier
    pub id: Uuid,
    /// Login e-mail
    pub email: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Whether the e-mail was verified
    pub is_verified: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
