//! Image uploads to object storage.
//!
//! # Buckets
//!
//! - `products` - `product-images/{millis}-{random}.{ext}`, never overwritten
//! - `hero` - `images/hero-{millis}.{ext}`, overwritten on collision
//!
//! Both are served with `Cache-Control: max-age=3600`.

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;

use boardquest_core::ImageUpload;

use crate::backend::{BackendError, Caller, ObjectStore, UploadOptions};

pub const PRODUCT_BUCKET: &str = "products";
pub const PRODUCT_PREFIX: &str = "product-images";
pub const HERO_BUCKET: &str = "hero";
pub const HERO_PREFIX: &str = "images";

const CACHE_CONTROL_SECS: u32 = 3600;
const RANDOM_SUFFIX_LEN: usize = 8;

/// Object path for a new product image.
#[must_use]
pub fn product_image_path(millis: i64, suffix: &str, extension: &str) -> String {
    format!("{PRODUCT_PREFIX}/{millis}-{suffix}.{extension}")
}

/// Object path for a new hero image.
#[must_use]
pub fn hero_image_path(millis: i64, extension: &str) -> String {
    format!("{HERO_PREFIX}/hero-{millis}.{extension}")
}

/// Storage path of a product image given its public URL.
///
/// Only the last URL segment is trusted; it is re-rooted under the product
/// prefix so a crafted URL cannot address another folder.
#[must_use]
pub fn product_image_path_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next()?;
    let file_name = without_query.rsplit('/').next()?;
    if file_name.is_empty() || file_name == ".." || file_name == "." {
        return None;
    }
    Some(format!("{PRODUCT_PREFIX}/{file_name}"))
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Uploads validated images and returns their public URLs.
pub struct ImageUploader<'a> {
    storage: &'a dyn ObjectStore,
}

impl<'a> ImageUploader<'a> {
    #[must_use]
    pub const fn new(storage: &'a dyn ObjectStore) -> Self {
        Self { storage }
    }

    /// Store a product image under a fresh unique name.
    ///
    /// # Errors
    ///
    /// Returns the storage error; nothing is stored in that case.
    pub async fn upload_product_image(
        &self,
        caller: &Caller,
        image: ImageUpload,
    ) -> Result<String, BackendError> {
        let path = product_image_path(
            Utc::now().timestamp_millis(),
            &random_suffix(),
            &image.extension,
        );
        self.put(caller, PRODUCT_BUCKET, &path, image, false).await
    }

    /// Store a hero image, replacing any object at the same path.
    ///
    /// # Errors
    ///
    /// Returns the storage error.
    pub async fn upload_hero_image(
        &self,
        caller: &Caller,
        image: ImageUpload,
    ) -> Result<String, BackendError> {
        let path = hero_image_path(Utc::now().timestamp_millis(), &image.extension);
        self.put(caller, HERO_BUCKET, &path, image, true).await
    }

    /// Remove the stored file behind a product image URL.
    ///
    /// # Errors
    ///
    /// Returns the storage error, or `BackendError::InvalidRequest` if no
    /// file name can be taken from the URL.
    pub async fn remove_product_image(
        &self,
        caller: &Caller,
        image_url: &str,
    ) -> Result<(), BackendError> {
        let path = product_image_path_from_url(image_url).ok_or_else(|| {
            BackendError::InvalidRequest(format!("no file name in image URL {image_url}"))
        })?;
        self.storage.remove(caller, PRODUCT_BUCKET, &[path]).await
    }

    async fn put(
        &self,
        caller: &Caller,
        bucket: &str,
        path: &str,
        image: ImageUpload,
        upsert: bool,
    ) -> Result<String, BackendError> {
        let options = UploadOptions {
            cache_control_secs: CACHE_CONTROL_SECS,
            upsert,
        };
        self.storage
            .upload(caller, bucket, path, image.bytes, &image.content_type, options)
            .await?;
        Ok(self.storage.public_url(bucket, path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn png() -> ImageUpload {
        ImageUpload::validate(Some("box.PNG"), "image/png", vec![137, 80, 78, 71]).unwrap()
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            product_image_path(1_714_557_600_000, "a1b2c3d4", "png"),
            "product-images/1714557600000-a1b2c3d4.png"
        );
        assert_eq!(
            hero_image_path(1_714_557_600_000, "webp"),
            "images/hero-1714557600000.webp"
        );
    }

    #[test]
    fn test_path_from_url_uses_last_segment() {
        assert_eq!(
            product_image_path_from_url(
                "https://abcd.supabase.co/storage/v1/object/public/products/product-images/1-abc.png?v=2"
            )
            .as_deref(),
            Some("product-images/1-abc.png")
        );
        assert_eq!(
            product_image_path_from_url("https://evil/other-folder/secret.png").as_deref(),
            Some("product-images/secret.png")
        );
        assert_eq!(product_image_path_from_url("https://host/"), None);
    }

    #[test]
    fn test_random_suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_product_upload_and_remove() {
        let backend = MemoryBackend::new();
        let uploader = ImageUploader::new(&backend);
        let caller = Caller::Anonymous;

        let url = uploader.upload_product_image(&caller, png()).await.unwrap();
        assert!(url.starts_with("http://storage.local/storage/v1/object/public/products/product-images/"));
        assert!(url.ends_with(".png"));

        let paths = backend.object_paths(PRODUCT_BUCKET).unwrap();
        assert_eq!(paths.len(), 1);
        let stored = backend.object(PRODUCT_BUCKET, &paths[0]).unwrap().unwrap();
        assert_eq!(stored.cache_control_secs, 3600);
        assert_eq!(stored.content_type, "image/png");

        uploader.remove_product_image(&caller, &url).await.unwrap();
        assert!(backend.object_paths(PRODUCT_BUCKET).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hero_upload_goes_to_hero_bucket() {
        let backend = MemoryBackend::new();
        let url = ImageUploader::new(&backend)
            .upload_hero_image(&Caller::Anonymous, png())
            .await
            .unwrap();
        assert!(url.contains("/public/hero/images/hero-"));
        assert_eq!(backend.object_paths(HERO_BUCKET).unwrap().len(), 1);
    }
}
