//! Multipart form decoding for the admin editors.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use boardquest_core::image::MAX_IMAGE_BYTES;
use boardquest_core::{ImageError, ImageUpload};

use crate::error::{AppError, Result};

/// Name of the file part in both admin forms.
const IMAGE_FIELD: &str = "image";

/// A decoded admin form: text fields plus an optional, validated image.
#[derive(Debug, Default)]
pub struct AdminForm {
    fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl AdminForm {
    /// Read every part of the request.
    ///
    /// An empty file part (a file input left blank) counts as no image.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed body and
    /// `AppError::Validation` for an image outside the allowed types or size,
    /// including a body cut off at the request size limit.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == IMAGE_FIELD {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(multipart_error)?;
                if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                    continue;
                }
                form.image = Some(ImageUpload::validate(
                    file_name.as_deref(),
                    &content_type,
                    bytes.to_vec(),
                )?);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(multipart_error)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// A text field, or `""` when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    /// A checkbox-style flag: present and `true`, `on` or `1`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.fields.get(name).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("true" | "on" | "1")
        )
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ImageError::TooLarge {
            size: MAX_IMAGE_BYTES + 1,
        }
        .into();
    }
    AppError::BadRequest(err.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> AdminForm {
        AdminForm {
            fields: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            image: None,
        }
    }

    #[test]
    fn test_text_defaults_to_empty() {
        let form = form(&[("name", "Catan")]);
        assert_eq!(form.text("name"), "Catan");
        assert_eq!(form.text("description"), "");
    }

    #[test]
    fn test_flag_values() {
        let form = form(&[("a", "on"), ("b", "TRUE"), ("c", "false"), ("d", "")]);
        assert!(form.flag("a"));
        assert!(form.flag("b"));
        assert!(!form.flag("c"));
        assert!(!form.flag("d"));
        assert!(!form.flag("missing"));
    }
}
