// ABOUTME: Request field validation and sanitization shared by all handlers
// ABOUTME: Trims and bounds text, escapes HTML, derives slugs and normalizes tags and currencies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Validation helpers return `AppResult` so handlers can chain them with `?`.
//! Length limits are counted in characters on the trimmed input, before HTML
//! escaping, so an `&` in a title does not eat into its budget.

use std::str::FromStr;

use rand::Rng;
use serde_json::json;

use crate::constants::limits::{
    EXCERPT_LEN, MAX_SETTING_KEY_LEN, MAX_TAGS, MAX_TAG_LEN, MIN_PASSWORD_LEN,
};
use crate::errors::{AppError, AppResult};

/// Longest slug derived from a title
const MAX_SLUG_LEN: usize = 80;

/// Slug used when a title has no slug-able characters
const FALLBACK_SLUG: &str = "untitled";

/// Lower-case, ASCII-alphanumeric, dash separated form of `input`
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug
}

/// Slug for a new row, never empty
#[must_use]
pub fn base_slug(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        FALLBACK_SLUG.to_owned()
    } else {
        slug
    }
}

/// `base` with a short random suffix, used when `base` is already taken
#[must_use]
pub fn slug_with_suffix(base: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
    format!("{base}-{suffix:06x}")
}

/// Trim and HTML-escape free text
#[must_use]
pub fn sanitize_text(input: &str) -> String {
    html_escape::encode_safe(input.trim()).into_owned()
}

/// Validate a mandatory text field and return it sanitized
///
/// # Errors
///
/// - `MISSING_REQUIRED_FIELD` when the value is absent
/// - `INVALID_INPUT` when it is blank or longer than `max_chars`
pub fn required_text(field: &str, value: Option<&str>, max_chars: usize) -> AppResult<String> {
    let value = value.ok_or_else(|| AppError::missing_field(field))?;
    optional_text(field, Some(value), max_chars)?.ok_or_else(|| {
        AppError::invalid_input(format!("Field '{field}' must not be empty"))
            .with_details(json!({ "field": field }))
    })
}

/// Validate an optional text field; blank input becomes `None`
///
/// # Errors
///
/// Returns `INVALID_INPUT` when the value is longer than `max_chars`
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> AppResult<Option<String>> {
    let Some(trimmed) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let length = trimmed.chars().count();
    if length > max_chars {
        return Err(AppError::invalid_input(format!(
            "Field '{field}' must be at most {max_chars} characters"
        ))
        .with_details(json!({ "field": field, "max": max_chars, "actual": length })));
    }
    Ok(Some(sanitize_text(trimmed)))
}

/// Plain-text preview of raw content, whitespace collapsed
#[must_use]
pub fn make_excerpt(raw_content: &str) -> String {
    let collapsed = raw_content.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut excerpt: String = collapsed.chars().take(EXCERPT_LEN).collect();
    if collapsed.chars().count() > EXCERPT_LEN {
        excerpt = excerpt.trim_end().to_owned();
        excerpt.push('…');
    }
    sanitize_text(&excerpt)
}

/// Basic e-mail shape check
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() <= 5 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some(at_pos) = email.find('@') else {
        return false;
    };
    if at_pos == 0 || at_pos == email.len() - 1 {
        return false; // @ at start or end
    }
    let domain_part = &email[at_pos + 1..];
    domain_part.contains('.') && !domain_part.contains('@')
}

/// Validate password strength
#[must_use]
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Trim, lower-case and validate an e-mail address
///
/// # Errors
///
/// Returns `INVALID_INPUT` for malformed addresses
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AppError::invalid_input("Invalid email format")
            .with_details(json!({ "field": "email" })))
    }
}

/// Validate and de-duplicate tag names
///
/// Tags are compared by slug, so `Rust` and `rust` collapse to the first spelling.
///
/// # Errors
///
/// Returns `INVALID_INPUT` for more than `MAX_TAGS` tags, blank or over-long names,
/// or names with no slug-able characters
pub fn normalize_tags(tags: &[String]) -> AppResult<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(tags.len());
    let mut slugs: Vec<String> = Vec::with_capacity(tags.len());

    for raw in tags {
        let name = raw.trim();
        let length = name.chars().count();
        if length == 0 || length > MAX_TAG_LEN {
            return Err(AppError::invalid_input(format!(
                "Tags must be between 1 and {MAX_TAG_LEN} characters"
            ))
            .with_details(json!({ "field": "tags", "tag": name })));
        }
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::invalid_input(format!(
                "Tag '{name}' must contain letters or digits"
            ))
            .with_details(json!({ "field": "tags", "tag": name })));
        }
        if !slugs.contains(&slug) {
            slugs.push(slug);
            names.push(sanitize_text(name));
        }
    }

    if names.len() > MAX_TAGS {
        return Err(
            AppError::invalid_input(format!("At most {MAX_TAGS} tags are allowed"))
                .with_details(json!({ "field": "tags", "max": MAX_TAGS })),
        );
    }
    Ok(names)
}

/// Upper-case and validate a three-letter ISO 4217 code
///
/// # Errors
///
/// Returns `INVALID_INPUT` unless the code is exactly three ASCII letters
pub fn normalize_currency(currency: &str) -> AppResult<String> {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(AppError::invalid_input(format!(
            "Invalid currency code '{}': expected a three-letter ISO 4217 code",
            currency.trim()
        ))
        .with_details(json!({ "field": "currency" })))
    }
}

/// Reject negative amounts and counts
///
/// # Errors
///
/// Returns `VALUE_OUT_OF_RANGE` when `value` is negative
pub fn non_negative(field: &str, value: i64) -> AppResult<i64> {
    if value < 0 {
        Err(
            AppError::out_of_range(format!("Field '{field}' must not be negative"))
                .with_details(json!({ "field": field, "min": 0 })),
        )
    } else {
        Ok(value)
    }
}

/// Check a setting key against `[a-z0-9_.-]{1,64}`
///
/// # Errors
///
/// Returns `INVALID_INPUT` for empty, over-long or disallowed keys
pub fn validate_setting_key(key: &str) -> AppResult<()> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'));
    if key.is_empty() || key.len() > MAX_SETTING_KEY_LEN || !valid_chars {
        return Err(AppError::invalid_input(format!(
            "Invalid setting key '{key}': use 1-{MAX_SETTING_KEY_LEN} characters from [a-z0-9_.-]"
        ))
        .with_details(json!({ "field": "key" })));
    }
    Ok(())
}

/// Parse an enumerated request field, recording the field name on failure
///
/// # Errors
///
/// Returns `INVALID_INPUT` when `raw` is not a known value
pub fn parse_choice<T>(field: &str, raw: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|e: AppError| e.with_details(json!({ "field": field })))
}

/// Reduce a client supplied file name to a safe display name
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .take(120)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_owned();
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned
    }
}
