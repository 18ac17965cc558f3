//! Core types for the storefront.
//!
//! Type-safe wrappers for ids, prices and emails, plus the plain records
//! stored by the backend (products, main content, admin users).

pub mod admin;
pub mod content;
pub mod email;
pub mod id;
pub mod price;
pub mod product;

pub use admin::AdminUser;
pub use content::{MainContent, MainContentDraft};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use product::{DraftError, Product, ProductDraft};
