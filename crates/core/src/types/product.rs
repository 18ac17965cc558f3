//! Products in the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::price::{Price, PriceError};

/// A product row from the `products` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Errors from validating an admin form submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftError {
    /// A required text field was blank.
    #[error("{0} is required")]
    Required(&'static str),
    /// The price field did not parse.
    #[error("invalid price: {0}")]
    Price(#[from] PriceError),
}

/// Validated product form input, ready to insert or update.
///
/// Serializes to the column layout of the `products` table (no `id`, the
/// backend assigns it on insert).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub image_url: Option<String>,
}

impl ProductDraft {
    /// Build a draft from raw form fields.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::Required` for a blank name and
    /// `DraftError::Price` when the price is missing, not a number or negative.
    pub fn parse(name: &str, price: &str, description: Option<&str>) -> Result<Self, DraftError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DraftError::Required("name"));
        }

        Ok(Self {
            name: name.to_string(),
            price: Price::parse(price)?,
            description: description.unwrap_or_default().trim().to_string(),
            image_url: None,
        })
    }

    /// Attach an image URL (a fresh upload or the product's current one).
    #[must_use]
    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}
