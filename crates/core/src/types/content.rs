//! The hero banner shown on the home page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::MainContentId;
use super::product::DraftError;

/// The singleton row of the `main_content` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainContent {
    pub id: MainContentId,
    #[serde(rename = "big_title")]
    pub title: String,
    pub paragraph: String,
    #[serde(rename = "button_text")]
    pub button_label: String,
    #[serde(default)]
    pub hero_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Validated main-screen form input.
///
/// The whole row is overwritten on every save, so the draft always carries
/// the final `hero_image` value (including `None` to clear it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MainContentDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MainContentId>,
    #[serde(rename = "big_title")]
    pub title: String,
    pub paragraph: String,
    #[serde(rename = "button_text")]
    pub button_label: String,
    pub hero_image: Option<String>,
}

impl MainContentDraft {
    /// Build a draft from raw form fields.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::Required` naming the first blank field.
    pub fn parse(title: &str, paragraph: &str, button_label: &str) -> Result<Self, DraftError> {
        Ok(Self {
            id: None,
            title: required(title, "big_title")?,
            paragraph: required(paragraph, "paragraph")?,
            button_label: required(button_label, "button_text")?,
            hero_image: None,
        })
    }

    /// Target an existing row so the upsert overwrites it.
    #[must_use]
    pub const fn for_existing(mut self, id: Option<MainContentId>) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_hero_image(mut self, hero_image: Option<String>) -> Self {
        self.hero_image = hero_image;
        self
    }
}

fn required(value: &str, field: &'static str) -> Result<String, DraftError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DraftError::Required(field));
    }
    Ok(trimmed.to_string())
}
