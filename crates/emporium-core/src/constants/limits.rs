// ABOUTME: Validation limits for request payloads
// ABOUTME: Field lengths, collection sizes, pagination bounds and upload sizes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// Maximum title length for posts and products
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum post content length
pub const MAX_CONTENT_LEN: usize = 100_000;

/// Maximum product body length
pub const MAX_BODY_LEN: usize = 20_000;

/// Maximum characters kept in a generated excerpt
pub const EXCERPT_LEN: usize = 280;

/// Maximum number of tags on a post or product
pub const MAX_TAGS: usize = 10;

/// Maximum tag length
pub const MAX_TAG_LEN: usize = 32;

/// Maximum category name length
pub const MAX_CATEGORY_NAME_LEN: usize = 64;

/// Maximum category description length
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum order note length
pub const MAX_NOTE_LEN: usize = 1_000;

/// Maximum line items per order
pub const MAX_ORDER_ITEMS: usize = 50;

/// Maximum quantity of one product on an order line
pub const MAX_LINE_QUANTITY: i64 = 1_000;

/// Maximum image alt text length
pub const MAX_ALT_TEXT_LEN: usize = 250;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum display name length
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum page size for list endpoints
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default maximum width of optimized images
pub const DEFAULT_IMAGE_MAX_WIDTH: u32 = 1_600;

/// Number of digits in a one-time password
pub const OTP_DIGITS: u32 = 6;

/// Default OTP lifetime
pub const DEFAULT_OTP_TTL_SECS: i64 = 600;

/// Failed verifications allowed before an OTP is burned
pub const OTP_MAX_ATTEMPTS: i64 = 5;

/// Maximum setting key length
pub const MAX_SETTING_KEY_LEN: usize = 64;
