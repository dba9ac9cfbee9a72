// ABOUTME: Site-wide key/value setting
// ABOUTME: Values are arbitrary JSON documents edited by administrators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored setting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Setting {
    /// Setting key (`[a-z0-9_.-]`)
    pub key: String,
    /// JSON value
    pub value: serde_json::Value,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Administrator who last wrote the value
    pub updated_by: Option<Uuid>,
}
