// ABOUTME: Limit/offset pagination for list endpoints
// ABOUTME: Clamps client supplied page sizes and wraps list results with totals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use serde::{Deserialize, Serialize};

use crate::constants::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// Rows to return (1..=`MAX_PAGE_SIZE`)
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl PageParams {
    /// Build from optional query values, clamping the limit into range
    #[must_use]
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of results with the total number of matching rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in this page
    pub items: Vec<T>,
    /// Total rows matching the filter
    pub total: u64,
    /// Limit used for this page
    pub limit: u32,
    /// Offset used for this page
    pub offset: u32,
}

impl<T> Page<T> {
    /// Assemble a page from items and the filter total
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, params: PageParams) -> Self {
        Self {
            items,
            total,
            limit: params.limit,
            offset: params.offset,
        }
    }

    /// Whether rows exist past this page
    #[must_use]
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.items.len() as u64) < self.total
    }
}
