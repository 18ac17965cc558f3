//! Board Quest Core - domain types and pure storefront rules.
//!
//! This crate is shared by the `storefront` service and its integration tests.
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. Everything here can be unit tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, emails and the stored records
//! - [`cart`] - Cart state and its quantity rules
//! - [`image`] - Upload validation (size and MIME allow-list)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod image;
pub mod types;

pub use cart::{Cart, CartItem, QuantityChange};
pub use image::{ImageError, ImageUpload};
pub use types::*;
