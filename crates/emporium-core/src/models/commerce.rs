// ABOUTME: Commerce models for the product catalogue and orders
// ABOUTME: Products, orders, order line items and the order status machine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Tag;
use crate::errors::AppError;

/// Catalogue visibility of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Being prepared by the seller
    #[default]
    Draft,
    /// Listed and purchasable
    Active,
    /// Withdrawn from sale
    Archived,
}

impl ProductStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(AppError::invalid_input(format!(
                "Invalid product status: {other}"
            ))),
        }
    }
}

/// A product listed by a seller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier
    pub id: Uuid,
    /// Seller (owner)
    pub seller_id: Uuid,
    /// Optional category of kind `product`
    pub category_id: Option<Uuid>,
    /// Title (HTML-escaped)
    pub title: String,
    /// Unique URL slug
    pub slug: String,
    /// Description (HTML-escaped)
    pub body: String,
    /// Unit price in minor currency units
    pub price_cents: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Units available
    pub stock: i64,
    /// Catalogue visibility
    pub status: ProductStatus,
    /// Attached tags
    pub tags: Vec<Tag>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether anonymous visitors may see and buy this product
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self.status, ProductStatus::Active)
    }
}

/// Lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, awaiting payment
    #[default]
    Pending,
    /// Payment captured
    Paid,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled before delivery
    Cancelled,
}

impl OrderStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether `self -> next` is an allowed transition
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Paid)
            | (Self::Paid, Self::Shipped)
            | (Self::Shipped, Self::Delivered) => true,
            (current, Self::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(AppError::invalid_input(format!("Invalid order status: {other}"))),
        }
    }
}

/// One line of an order; title and price are snapshotted at purchase time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    /// Unique identifier
    pub id: Uuid,
    /// Purchased product (None once the product was deleted)
    pub product_id: Option<Uuid>,
    /// Product title at purchase time
    pub title: String,
    /// Units purchased
    pub quantity: i64,
    /// Unit price at purchase time in minor units
    pub unit_price_cents: i64,
}

impl OrderItem {
    /// Line total in minor units
    #[must_use]
    pub const fn line_total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier
    pub id: Uuid,
    /// Customer (owner)
    pub user_id: Uuid,
    /// Lifecycle state
    pub status: OrderStatus,
    /// Sum of line totals in minor units
    pub total_cents: i64,
    /// ISO 4217 currency code shared by all lines
    pub currency: String,
    /// Optional customer note (HTML-escaped)
    pub note: Option<String>,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}
