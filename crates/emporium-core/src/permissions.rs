// ABOUTME: Role-based permission checks for the content and commerce API
// ABOUTME: Defines UserRole and the owner-or-admin rule used by mutating handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account: owns its posts, products, orders and images
    #[default]
    User,
    /// Site administrator: may modify anything and manage taxonomy/settings
    Admin,
}

impl UserRole {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Whether this role bypasses ownership checks
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::invalid_input(format!("Invalid user role: {other}"))),
        }
    }
}

/// Allow the action when the actor owns the resource or is an admin
///
/// # Errors
///
/// Returns `PERMISSION_DENIED` when the actor is neither owner nor admin
pub fn ensure_owner_or_admin(
    actor_id: Uuid,
    actor_role: UserRole,
    owner_id: Uuid,
    resource: &str,
) -> AppResult<()> {
    if actor_id == owner_id || actor_role.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "You do not own this {resource}"
        ))
        .with_user_id(actor_id))
    }
}

/// Allow the action only for admins
///
/// # Errors
///
/// Returns `PERMISSION_DENIED` for non-admin roles
pub fn ensure_admin(actor_role: UserRole, action: &str) -> AppResult<()> {
    if actor_role.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Administrator role required to {action}"
        )))
    }
}
