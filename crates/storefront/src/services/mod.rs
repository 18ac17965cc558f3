//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Sign-up, sign-in, sign-out and session checks against the
//!   identity provider
//! - `cart` - Session cart for signed-in users
//! - `cart_store` - Redundant per-user cart copies
//! - `uploads` - Product and hero images in object storage

pub mod auth;
pub mod cart;
pub mod cart_store;
pub mod uploads;
