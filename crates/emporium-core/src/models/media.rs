// ABOUTME: Uploaded image model
// ABOUTME: Tracks original and optimized files plus the background optimization state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Optimization state of an uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// Stored, waiting for the optimization job
    #[default]
    Pending,
    /// Optimized variant available
    Ready,
    /// Optimization failed after all retries
    Failed,
}

impl ImageStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ImageStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::invalid_input(format!("Invalid image status: {other}"))),
        }
    }
}

/// The row an image is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum ImageParent {
    /// Attached to a post
    Post(Uuid),
    /// Attached to a product
    Product(Uuid),
}

/// An uploaded image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    /// Unique identifier
    pub id: Uuid,
    /// Uploader (owner)
    pub owner_id: Uuid,
    /// Parent row
    pub parent: ImageParent,
    /// Sanitized client file name
    pub file_name: String,
    /// Path of the original relative to the media root
    pub original_path: String,
    /// Path of the optimized variant relative to the media root
    pub optimized_path: Option<String>,
    /// Sniffed MIME type
    pub mime_type: String,
    /// Original size in bytes
    pub size_bytes: i64,
    /// Optimized size in bytes
    pub optimized_size_bytes: Option<i64>,
    /// Pixel width after optimization
    pub width: Option<i64>,
    /// Pixel height after optimization
    pub height: Option<i64>,
    /// Alternative text (HTML-escaped)
    pub alt_text: Option<String>,
    /// Optimization state
    pub status: ImageStatus,
    /// Error recorded by the last failed optimization
    pub last_error: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Image {
    /// Every file on disk belonging to this image
    #[must_use]
    pub fn stored_paths(&self) -> Vec<String> {
        let mut paths = vec![self.original_path.clone()];
        if let Some(optimized) = &self.optimized_path {
            paths.push(optimized.clone());
        }
        paths
    }
}
