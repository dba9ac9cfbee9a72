// ABOUTME: Relational data models for the content and commerce backend
// ABOUTME: Re-exports users, content, commerce, media, settings and OTP records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Data Models
//!
//! Plain records mirroring the database tables. Enumerated columns are stored
//! as lowercase text; every enum exposes `as_str` for binding and `FromStr`
//! for decoding rows and request fields.

mod commerce;
mod content;
mod media;
mod otp;
mod setting;
mod user;

pub use commerce::{Order, OrderItem, OrderStatus, Product, ProductStatus};
pub use content::{Category, CategoryKind, Post, PostStatus, PostType, Tag};
pub use media::{Image, ImageParent, ImageStatus};
pub use otp::{Otp, OtpPurpose};
pub use setting::Setting;
pub use user::{PublicUser, User};
