//! Validation for product and hero image uploads.

use serde::Serialize;
use thiserror::Error;

/// Largest accepted upload: 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// MIME types accepted for uploads, with their canonical file extension.
pub const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// Why an upload was refused.
///
/// The messages are shown to the admin as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Invalid file type. Please upload JPG, PNG, or WebP images only.")]
    UnsupportedType(String),
    #[error("File size too large. Maximum size is 5MB.")]
    TooLarge { size: usize },
    #[error("The uploaded file is empty.")]
    Empty,
}

/// An upload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUpload {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

impl ImageUpload {
    /// Validate a file received from a form.
    ///
    /// The extension is taken from the original file name (text after the
    /// last `.`) when it is plain ASCII letters and digits, falling back to
    /// the MIME type's canonical extension.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedType` outside the allow-list,
    /// `ImageError::TooLarge` above [`MAX_IMAGE_BYTES`], and
    /// `ImageError::Empty` for a zero-byte file.
    pub fn validate(
        file_name: Option<&str>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let content_type = content_type.trim().to_ascii_lowercase();
        let Some(canonical) = canonical_extension(&content_type) else {
            return Err(ImageError::UnsupportedType(content_type));
        };

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge { size: bytes.len() });
        }
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let extension = file_name
            .and_then(file_extension)
            .unwrap_or(canonical)
            .to_ascii_lowercase();

        Ok(Self {
            bytes,
            content_type,
            extension,
        })
    }
}

fn canonical_extension(content_type: &str) -> Option<&'static str> {
    ACCEPTED_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

fn file_extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allow_listed_types() {
        for (mime, _) in ACCEPTED_TYPES {
            assert!(ImageUpload::validate(Some("a.img"), mime, vec![1]).is_ok());
        }
    }

    #[test]
    fn test_rejects_other_types() {
        let err = ImageUpload::validate(Some("a.gif"), "image/gif", vec![1]).unwrap_err();
        assert_eq!(err, ImageError::UnsupportedType("image/gif".to_string()));
        assert_eq!(
            err.to_string(),
            "Invalid file type. Please upload JPG, PNG, or WebP images only."
        );
    }

    #[test]
    fn test_size_boundary() {
        assert!(ImageUpload::validate(None, "image/png", vec![0; MAX_IMAGE_BYTES]).is_ok());
        let err = ImageUpload::validate(None, "image/png", vec![0; MAX_IMAGE_BYTES + 1]).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { .. }));
    }

    #[test]
    fn test_rejects_empty_file() {
        assert_eq!(
            ImageUpload::validate(Some("a.png"), "image/png", Vec::new()),
            Err(ImageError::Empty)
        );
    }

    #[test]
    fn test_extension_from_file_name() {
        let upload = ImageUpload::validate(Some("Board.Photo.JPEG"), "image/jpeg", vec![1]).unwrap();
        assert_eq!(upload.extension, "jpeg");
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        let upload = ImageUpload::validate(Some("noext"), "IMAGE/WEBP", vec![1]).unwrap();
        assert_eq!(upload.extension, "webp");
        assert_eq!(upload.content_type, "image/webp");
        let upload = ImageUpload::validate(Some(".hidden"), "image/png", vec![1]).unwrap();
        assert_eq!(upload.extension, "png");
    }

    #[test]
    fn test_extension_must_be_alphanumeric() {
        for name in ["box.png?x", "box.p/ng", "box.png ", "box.pn%67", "box.jpé"] {
            let upload = ImageUpload::validate(Some(name), "image/png", vec![1]).unwrap();
            assert_eq!(upload.extension, "png", "{name}");
        }
    }
}
