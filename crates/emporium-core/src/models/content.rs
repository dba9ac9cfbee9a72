// ABOUTME: Editorial content models
// ABOUTME: Posts with their category and tag taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Which entity a category classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Editorial posts
    #[default]
    Post,
    /// Catalogue products
    Product,
}

impl CategoryKind {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "product" => Ok(Self::Product),
            other => Err(AppError::invalid_input(format!(
                "Invalid category kind: {other} (expected post or product)"
            ))),
        }
    }
}

/// A category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// URL slug, unique per kind
    pub slug: String,
    /// Optional description
    pub description: Option<String>,
    /// Entity kind this category applies to
    pub kind: CategoryKind,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A free-form tag shared by posts and products
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// URL slug, globally unique
    pub slug: String,
}

/// Editorial flavour of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    /// Long-form article
    #[default]
    Article,
    /// Time-sensitive news item
    News,
    /// Static page
    Page,
}

impl PostType {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::News => "news",
            Self::Page => "page",
        }
    }
}

impl FromStr for PostType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(Self::Article),
            "news" => Ok(Self::News),
            "page" => Ok(Self::Page),
            other => Err(AppError::invalid_input(format!("Invalid post type: {other}"))),
        }
    }
}

/// Publication state of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Only visible to the author and admins
    #[default]
    Draft,
    /// Publicly visible
    Published,
}

impl PostStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl FromStr for PostStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(AppError::invalid_input(format!("Invalid post status: {other}"))),
        }
    }
}

/// A blog post, news item or page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: Uuid,
    /// Author (owner)
    pub author_id: Uuid,
    /// Optional category of kind `post`
    pub category_id: Option<Uuid>,
    /// Title (HTML-escaped)
    pub title: String,
    /// Unique URL slug
    pub slug: String,
    /// Body (HTML-escaped)
    pub content: String,
    /// Plain-text preview derived from content
    pub excerpt: String,
    /// Editorial flavour
    #[serde(rename = "type")]
    pub post_type: PostType,
    /// Publication state
    pub status: PostStatus,
    /// First publication time
    pub published_at: Option<DateTime<Utc>>,
    /// Attached tags
    pub tags: Vec<Tag>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Whether anonymous visitors may read this post
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self.status, PostStatus::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_type_parse() {
        assert_eq!("news".parse::<PostType>().unwrap(), PostType::News);
        assert!("podcast".parse::<PostType>().is_err());
    }

    #[test]
    fn test_category_kind_serde() {
        let json = serde_json::to_string(&CategoryKind::Product).unwrap();
        assert_eq!(json, "\"product\"");
    }
}
